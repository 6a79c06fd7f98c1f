//! Purpose: Parse node info replies (`k=v;k=v`, `name\tbody`, `FAIL:code:msg`) into maps.
//! Exports: `InfoMap`, `response_body`, `parse_kv`, `parse_list`.
//! Role: Gives job status probes a structured view of per-node text replies.
//! Invariants: A `FAIL`/`ERROR` reply becomes a `Server` error carrying the node's code.
use super::error::{Error, ErrorKind};
use std::collections::BTreeMap;

pub type InfoMap = BTreeMap<String, String>;

/// Strip the echoed `command\t` prefix and trailing whitespace from a raw reply.
pub fn response_body(raw: &str) -> &str {
    let line = raw.trim_end_matches(['\n', '\r']);
    match line.split_once('\t') {
        Some((_command, body)) => body.trim(),
        None => line.trim(),
    }
}

/// `load_pct=100;keys=12` style replies.
pub fn parse_kv(raw: &str) -> Result<InfoMap, Error> {
    let body = response_body(raw);
    check_failure(body)?;
    Ok(split_pairs(body, ';'))
}

/// `filename=a.lua,hash=..,type=LUA;filename=b.lua,...` style replies.
pub fn parse_list(raw: &str) -> Result<Vec<InfoMap>, Error> {
    let body = response_body(raw);
    check_failure(body)?;
    Ok(body
        .split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let sep = if entry.contains(',') { ',' } else { ':' };
            split_pairs(entry, sep)
        })
        .collect())
}

fn split_pairs(body: &str, sep: char) -> InfoMap {
    body.split(sep)
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) => (key.trim().to_string(), value.trim().to_string()),
            None => (pair.to_string(), String::new()),
        })
        .collect()
}

fn check_failure(body: &str) -> Result<(), Error> {
    let rest = match body
        .strip_prefix("FAIL")
        .or_else(|| body.strip_prefix("ERROR"))
    {
        Some(rest) if rest.is_empty() || rest.starts_with(':') => rest,
        _ => return Ok(()),
    };
    let mut parts = rest.strip_prefix(':').unwrap_or(rest).splitn(2, ':');
    let code = parts.next().and_then(|code| code.trim().parse::<i32>().ok());
    let message = parts.next().map(str::trim).filter(|msg| !msg.is_empty());

    let mut err = Error::new(ErrorKind::Server);
    if let Some(code) = code {
        err = err.with_code(code);
    }
    Err(err.with_message(message.unwrap_or("node rejected info command")))
}
