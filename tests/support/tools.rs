#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use stepgate::tools::{Tool, ToolOutcome, ToolParams, ToolRegistry};

#[derive(Clone)]
pub enum Script {
    Succeed,
    Fail(&'static str),
    Error(&'static str),
    Panic(&'static str),
}

/// Tool with a fixed result that counts its calls.
pub struct ScriptedTool {
    name: String,
    script: Script,
    calls: Arc<AtomicUsize>,
}

impl ScriptedTool {
    pub fn new(name: &str, script: Script) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                name: name.to_string(),
                script,
                calls: Arc::clone(&calls),
            },
            calls,
        )
    }
}

impl Tool for ScriptedTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "scripted test tool"
    }

    fn execute(&self, params: &ToolParams) -> anyhow::Result<ToolOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.script {
            Script::Succeed => Ok(ToolOutcome::ok(json!({ "echo": params }))),
            Script::Fail(message) => Ok(ToolOutcome::failure(*message)),
            Script::Error(message) => Err(anyhow::anyhow!("{message}")),
            Script::Panic(message) => panic!("{message}"),
        }
    }
}

/// Blocks inside `execute` until the test releases it (or five seconds pass).
pub struct LatchTool {
    name: String,
    release: Mutex<Receiver<()>>,
}

impl LatchTool {
    pub fn new(name: &str) -> (Self, Sender<()>) {
        let (tx, rx) = channel();
        (
            Self {
                name: name.to_string(),
                release: Mutex::new(rx),
            },
            tx,
        )
    }
}

impl Tool for LatchTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "waits for the test to release it"
    }

    fn execute(&self, _params: &ToolParams) -> anyhow::Result<ToolOutcome> {
        let release = self.release.lock().unwrap();
        let _ = release.recv_timeout(Duration::from_secs(5));
        Ok(ToolOutcome::ok(json!("released")))
    }
}

/// Registry of always-succeeding tools with the given names.
pub fn succeeding(names: &[&str]) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    for name in names {
        registry.register(Box::new(ScriptedTool::new(name, Script::Succeed).0));
    }
    registry
}
