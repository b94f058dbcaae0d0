//! Parsing of `--module` simulation scripts
//!
//! A script has the form `<method>=<segment>/<segment>/...`. Each segment is
//! either a module flag (`absent`, `unenrolled`, `inaccessible`, `locked`),
//! `inert` for a vendor session that never answers, or a comma-separated
//! list of events making up one vendor session: `ok`, `nomatch`,
//! `err:<code>`, `help:<code>`.

use std::str::FromStr;
use std::time::Duration;

use biocompat_core::{BiometricMethod, ScriptedModule, VendorEvent};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScriptError {
    #[error("expected <method>=<script>, got '{0}'")]
    MissingSeparator(String),

    #[error("unknown method '{0}'")]
    UnknownMethod(String),

    #[error("invalid event '{0}'")]
    InvalidEvent(String),

    #[error("invalid code in '{0}'")]
    InvalidCode(String),
}

/// One simulated back-end
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleScript {
    pub method: BiometricMethod,
    pub hardware: bool,
    pub enrolled: bool,
    pub accessible: bool,
    pub vendor_locked: bool,
    pub sessions: Vec<Vec<VendorEvent>>,
}

impl ModuleScript {
    fn new(method: BiometricMethod) -> Self {
        Self {
            method,
            hardware: true,
            enrolled: true,
            accessible: true,
            vendor_locked: false,
            sessions: Vec::new(),
        }
    }

    /// Build the scripted module
    pub fn into_module(self, step_delay: Duration) -> ScriptedModule {
        let mut module = ScriptedModule::new(self.method)
            .with_hardware(self.hardware)
            .with_enrolled(self.enrolled)
            .with_step_delay(step_delay);
        if !self.accessible {
            module = module.inaccessible();
        }
        for session in self.sessions {
            module = module.with_session(session);
        }
        module.set_vendor_locked(self.vendor_locked);
        module
    }
}

fn parse_code(token: &str, digits: &str) -> Result<i32, ScriptError> {
    digits
        .parse()
        .map_err(|_| ScriptError::InvalidCode(token.to_string()))
}

fn parse_event(token: &str) -> Result<VendorEvent, ScriptError> {
    match token {
        "ok" => Ok(VendorEvent::Succeeded),
        "nomatch" => Ok(VendorEvent::NoMatch),
        _ => {
            if let Some(code) = token.strip_prefix("err:") {
                Ok(VendorEvent::error(parse_code(token, code)?))
            } else if let Some(code) = token.strip_prefix("help:") {
                Ok(VendorEvent::help(parse_code(token, code)?))
            } else {
                Err(ScriptError::InvalidEvent(token.to_string()))
            }
        }
    }
}

impl FromStr for ModuleScript {
    type Err = ScriptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, body) = s
            .split_once('=')
            .ok_or_else(|| ScriptError::MissingSeparator(s.to_string()))?;
        let method: BiometricMethod = name
            .trim()
            .parse()
            .map_err(|_| ScriptError::UnknownMethod(name.to_string()))?;

        let mut script = ModuleScript::new(method);
        for segment in body.split('/').map(str::trim).filter(|s| !s.is_empty()) {
            match segment {
                "absent" => script.hardware = false,
                "unenrolled" => script.enrolled = false,
                "inaccessible" => script.accessible = false,
                "locked" => script.vendor_locked = true,
                "inert" => script.sessions.push(Vec::new()),
                _ => {
                    let events = segment
                        .split(',')
                        .map(|t| parse_event(t.trim()))
                        .collect::<Result<Vec<_>, _>>()?;
                    script.sessions.push(events);
                }
            }
        }

        Ok(script)
    }
}
