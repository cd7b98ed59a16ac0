use dispatch::{Handler, HandlerRegistry, Opts, RegistryError};
use serde_json::{json, Value};
use shared::protocol::{Reply, STATUS_SUCCESS};

/// Builds the registry from the explicit registration table below. Adding an
/// operation means adding one entry here; duplicate names fail at startup.
pub fn build_registry() -> Result<HandlerRegistry, RegistryError> {
    let mut entries: Vec<(&'static str, Handler)> = vec![
        ("ping", Box::new(handle_ping)),
        ("echo", Box::new(handle_echo)),
        ("version", Box::new(handle_version)),
    ];

    let mut names: Vec<String> = entries.iter().map(|(cmd, _)| cmd.to_string()).collect();
    names.push("commands".to_string());
    names.sort();
    entries.push((
        "commands",
        Box::new(move |_opts| Ok(Reply::success(json!(names)))),
    ));

    HandlerRegistry::build(entries)
}

fn handle_ping(_opts: Option<&Opts>) -> anyhow::Result<Reply> {
    Ok(Reply::success("pong"))
}

fn handle_echo(opts: Option<&Opts>) -> anyhow::Result<Reply> {
    match opts {
        Some(opts) => Ok(Reply::success(Value::Object(opts.clone()))),
        None => Ok(Reply::new(STATUS_SUCCESS, None, Some("No opts given".into()))),
    }
}

fn handle_version(_opts: Option<&Opts>) -> anyhow::Result<Reply> {
    Ok(Reply::success(env!("CARGO_PKG_VERSION")))
}
