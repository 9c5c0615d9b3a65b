//! Field extraction from WS-Management responses.
//!
//! The handful of values the shell protocol needs sit at fixed, well-known
//! elements, so they are matched directly rather than through a DOM.

use std::sync::LazyLock;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use regex::Regex;

/// `ERROR_WSMAN_OPERATION_TIMEOUT`: no output yet, poll again.
pub const OPERATION_TIMEOUT_FAULT: &str = "2150858793";

static SHELL_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<(?:\w+:)?ShellId>\s*([^<\s]+)\s*</(?:\w+:)?ShellId>").expect("static regex")
});

static SHELL_SELECTOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<(?:\w+:)?Selector\s+Name="ShellId"\s*>\s*([^<\s]+)\s*<"#).expect("static regex")
});

static COMMAND_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<(?:\w+:)?CommandId>\s*([^<\s]+)\s*</(?:\w+:)?CommandId>").expect("static regex")
});

static STREAM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<(?:\w+:)?Stream\s+([^>]*?)(?:/>|>([^<]*)</(?:\w+:)?Stream>)")
        .expect("static regex")
});

static STREAM_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bName="(\w+)""#).expect("static regex"));

static COMMAND_DONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<(?:\w+:)?CommandState\s[^>]*State="[^"]*CommandState/Done""#)
        .expect("static regex")
});

static EXIT_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<(?:\w+:)?ExitCode>\s*(-?\d+)\s*</(?:\w+:)?ExitCode>").expect("static regex")
});

static FAULT_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<(?:\w+:)?WSManFault\s[^>]*\bCode="(\d+)""#).expect("static regex")
});

static FAULT_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<(?:\w+:)?(?:Message|Text)(?:\s[^>]*)?>(.*?)</(?:\w+:)?(?:Message|Text)>")
        .expect("static regex")
});

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("static regex"));

/// Output gathered from one `Receive` response.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ReceiveChunk {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub done: bool,
    pub exit_code: Option<i64>,
}

/// A SOAP fault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub code: Option<String>,
    pub reason: String,
}

impl Fault {
    #[must_use]
    pub fn is_operation_timeout(&self) -> bool {
        self.code.as_deref() == Some(OPERATION_TIMEOUT_FAULT)
    }
}

/// Shell id from a `Create` response.
#[must_use]
pub fn shell_id(xml: &str) -> Option<String> {
    SHELL_ID
        .captures(xml)
        .or_else(|| SHELL_SELECTOR.captures(xml))
        .map(|caps| caps[1].to_string())
}

/// Command id from a `Command` response.
#[must_use]
pub fn command_id(xml: &str) -> Option<String> {
    COMMAND_ID.captures(xml).map(|caps| caps[1].to_string())
}

/// Decode streams, completion state and exit code of a `Receive` response.
///
/// # Errors
/// Returns error if a stream is not valid base64.
pub fn parse_receive(xml: &str) -> Result<ReceiveChunk, String> {
    let mut chunk = ReceiveChunk::default();
    for caps in STREAM.captures_iter(xml) {
        let Some(content) = caps.get(2).map(|m| m.as_str().trim()) else {
            continue;
        };
        if content.is_empty() {
            continue;
        }
        let name = STREAM_NAME
            .captures(&caps[1])
            .map(|c| c[1].to_string())
            .unwrap_or_default();
        let bytes = STANDARD
            .decode(content)
            .map_err(|e| format!("invalid {name} stream: {e}"))?;
        match name.as_str() {
            "stdout" => chunk.stdout.extend(bytes),
            "stderr" => chunk.stderr.extend(bytes),
            _ => {}
        }
    }

    chunk.done = COMMAND_DONE.is_match(xml);
    chunk.exit_code = EXIT_CODE
        .captures(xml)
        .and_then(|caps| caps[1].parse().ok());
    Ok(chunk)
}

/// Fault code and human-readable reason of an error response.
#[must_use]
pub fn parse_fault(xml: &str) -> Fault {
    let code = FAULT_CODE.captures(xml).map(|caps| caps[1].to_string());
    let reason = FAULT_TEXT
        .captures(xml)
        .map(|caps| TAG.replace_all(&caps[1], " ").split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| "unknown WS-Management fault".to_string());
    Fault { code, reason }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECEIVE_RUNNING: &str = r#"<s:Envelope><s:Body><rsp:ReceiveResponse>
        <rsp:Stream Name="stdout" CommandId="C1">aGVsbG8NCg==</rsp:Stream>
        <rsp:Stream Name="stderr" CommandId="C1"></rsp:Stream>
        <rsp:CommandState CommandId="C1" State="http://schemas.microsoft.com/wbem/wsman/1/windows/shell/CommandState/Running"/>
        </rsp:ReceiveResponse></s:Body></s:Envelope>"#;

    const RECEIVE_DONE: &str = r#"<s:Envelope><s:Body><rsp:ReceiveResponse>
        <rsp:Stream Name="stdout" CommandId="C1" End="true"/>
        <rsp:Stream Name="stderr" CommandId="C1">b29wcw==</rsp:Stream>
        <rsp:Stream Name="stderr" CommandId="C1" End="true"></rsp:Stream>
        <rsp:CommandState CommandId="C1" State="http://schemas.microsoft.com/wbem/wsman/1/windows/shell/CommandState/Done">
        <rsp:ExitCode>3</rsp:ExitCode></rsp:CommandState>
        </rsp:ReceiveResponse></s:Body></s:Envelope>"#;

    #[test]
    fn test_ids() {
        let create = "<s:Body><rsp:Shell><rsp:ShellId>11AA-22BB</rsp:ShellId></rsp:Shell></s:Body>";
        assert_eq!(shell_id(create).as_deref(), Some("11AA-22BB"));

        let selector = r#"<w:SelectorSet><w:Selector Name="ShellId">33CC</w:Selector></w:SelectorSet>"#;
        assert_eq!(shell_id(selector).as_deref(), Some("33CC"));

        let command = "<rsp:CommandResponse><rsp:CommandId>C1</rsp:CommandId></rsp:CommandResponse>";
        assert_eq!(command_id(command).as_deref(), Some("C1"));
        assert_eq!(command_id("<empty/>"), None);
    }

    #[test]
    fn test_receive_running() {
        let chunk = parse_receive(RECEIVE_RUNNING).unwrap();
        assert_eq!(chunk.stdout, b"hello\r\n");
        assert!(chunk.stderr.is_empty());
        assert!(!chunk.done);
        assert_eq!(chunk.exit_code, None);
    }

    #[test]
    fn test_receive_done() {
        let chunk = parse_receive(RECEIVE_DONE).unwrap();
        assert!(chunk.stdout.is_empty());
        assert_eq!(chunk.stderr, b"oops");
        assert!(chunk.done);
        assert_eq!(chunk.exit_code, Some(3));
    }

    #[test]
    fn test_receive_rejects_bad_base64() {
        let xml = r#"<rsp:Stream Name="stdout" CommandId="C1">@@@</rsp:Stream>"#;
        assert!(parse_receive(xml).is_err());
    }

    #[test]
    fn test_fault() {
        let xml = r#"<s:Fault><s:Reason><s:Text xml:lang="en-US">The WS-Management service cannot complete the operation within the time specified in OperationTimeout.</s:Text></s:Reason>
            <s:Detail><f:WSManFault xmlns:f="http://schemas.microsoft.com/wbem/wsman/1/wsmanfault" Code="2150858793" Machine="win01">
            <f:Message>timeout</f:Message></f:WSManFault></s:Detail></s:Fault>"#;
        let fault = parse_fault(xml);
        assert!(fault.is_operation_timeout());
        assert!(fault.reason.starts_with("The WS-Management service"));

        let other = parse_fault("<s:Fault><f:Message><f:ProviderFault>Access is denied.</f:ProviderFault></f:Message></s:Fault>");
        assert!(!other.is_operation_timeout());
        assert_eq!(other.reason, "Access is denied.");
    }
}
