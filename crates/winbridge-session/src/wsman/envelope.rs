//! SOAP envelopes for the WinRS shell resource.

use std::{borrow::Cow, collections::BTreeMap, fmt::Write as _};

use uuid::Uuid;

const NS: &str = concat!(
    r#"xmlns:s="http://www.w3.org/2003/05/soap-envelope" "#,
    r#"xmlns:wsa="http://schemas.xmlsoap.org/ws/2004/08/addressing" "#,
    r#"xmlns:wsman="http://schemas.dmtf.org/wbem/wsman/1/wsman.xsd" "#,
    r#"xmlns:rsp="http://schemas.microsoft.com/wbem/wsman/1/windows/shell""#,
);

const ANONYMOUS: &str = "http://schemas.xmlsoap.org/ws/2004/08/addressing/role/anonymous";
const RESOURCE_URI_CMD: &str = "http://schemas.microsoft.com/wbem/wsman/1/windows/shell/cmd";

const ACTION_CREATE: &str = "http://schemas.xmlsoap.org/ws/2004/09/transfer/Create";
const ACTION_DELETE: &str = "http://schemas.xmlsoap.org/ws/2004/09/transfer/Delete";
const ACTION_COMMAND: &str = "http://schemas.microsoft.com/wbem/wsman/1/windows/shell/Command";
const ACTION_RECEIVE: &str = "http://schemas.microsoft.com/wbem/wsman/1/windows/shell/Receive";
const ACTION_SIGNAL: &str = "http://schemas.microsoft.com/wbem/wsman/1/windows/shell/Signal";
const SIGNAL_TERMINATE: &str =
    "http://schemas.microsoft.com/wbem/wsman/1/windows/shell/signal/terminate";

/// Largest envelope the endpoint is asked to accept or send.
pub const MAX_ENVELOPE_SIZE: u32 = 153_600;

/// Per-session values stamped into every header.
#[derive(Debug, Clone, Copy)]
pub struct EnvelopeContext<'a> {
    pub endpoint: &'a str,
    pub operation_timeout_secs: u64,
}

/// Escape text for element content and attribute values.
#[must_use]
pub fn xml_escape(s: &str) -> Cow<'_, str> {
    if !s.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(s);
    }
    let mut out = String::with_capacity(s.len() + 16);
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    Cow::Owned(out)
}

fn envelope(
    ctx: EnvelopeContext<'_>,
    action: &str,
    shell_id: Option<&str>,
    options: &[(&str, &str)],
    body: &str,
) -> String {
    let mut header = String::with_capacity(1024);
    let _ = write!(
        header,
        "<wsa:To>{to}</wsa:To>\
         <wsa:ReplyTo><wsa:Address s:mustUnderstand=\"true\">{ANONYMOUS}</wsa:Address></wsa:ReplyTo>\
         <wsman:MaxEnvelopeSize s:mustUnderstand=\"true\">{MAX_ENVELOPE_SIZE}</wsman:MaxEnvelopeSize>\
         <wsa:MessageID>uuid:{id}</wsa:MessageID>\
         <wsman:Locale xml:lang=\"en-US\" s:mustUnderstand=\"false\"/>\
         <wsman:OperationTimeout>PT{timeout}S</wsman:OperationTimeout>\
         <wsman:ResourceURI s:mustUnderstand=\"true\">{RESOURCE_URI_CMD}</wsman:ResourceURI>\
         <wsa:Action s:mustUnderstand=\"true\">{action}</wsa:Action>",
        to = xml_escape(ctx.endpoint),
        id = Uuid::new_v4().to_string().to_uppercase(),
        timeout = ctx.operation_timeout_secs,
    );
    if let Some(shell_id) = shell_id {
        let _ = write!(
            header,
            "<wsman:SelectorSet><wsman:Selector Name=\"ShellId\">{}</wsman:Selector></wsman:SelectorSet>",
            xml_escape(shell_id)
        );
    }
    if !options.is_empty() {
        header.push_str("<wsman:OptionSet>");
        for (name, value) in options {
            let _ = write!(header, "<wsman:Option Name=\"{name}\">{value}</wsman:Option>");
        }
        header.push_str("</wsman:OptionSet>");
    }

    format!("<s:Envelope {NS}><s:Header>{header}</s:Header><s:Body>{body}</s:Body></s:Envelope>")
}

/// Unauthenticated-safe probe used as the connect handshake.
#[must_use]
pub fn identify() -> String {
    concat!(
        r#"<s:Envelope xmlns:s="http://www.w3.org/2003/05/soap-envelope" "#,
        r#"xmlns:wsmid="http://schemas.dmtf.org/wbem/wsman/identity/1/wsmanidentity.xsd">"#,
        "<s:Header/><s:Body><wsmid:Identify/></s:Body></s:Envelope>"
    )
    .to_string()
}

/// Open a cmd shell carrying `env` for every command it runs.
#[must_use]
pub fn create_shell(ctx: EnvelopeContext<'_>, env: &BTreeMap<String, String>) -> String {
    let mut body = String::from(
        "<rsp:Shell><rsp:InputStreams>stdin</rsp:InputStreams><rsp:OutputStreams>stdout stderr</rsp:OutputStreams>",
    );
    if !env.is_empty() {
        body.push_str("<rsp:Environment>");
        for (key, value) in env {
            let _ = write!(
                body,
                "<rsp:Variable Name=\"{}\">{}</rsp:Variable>",
                xml_escape(key),
                xml_escape(value)
            );
        }
        body.push_str("</rsp:Environment>");
    }
    body.push_str("</rsp:Shell>");

    envelope(
        ctx,
        ACTION_CREATE,
        None,
        &[("WINRS_NOPROFILE", "FALSE"), ("WINRS_CODEPAGE", "65001")],
        &body,
    )
}

/// Start `command_line` in an open shell.
#[must_use]
pub fn command(ctx: EnvelopeContext<'_>, shell_id: &str, command_line: &str) -> String {
    let body = format!(
        "<rsp:CommandLine><rsp:Command>{}</rsp:Command></rsp:CommandLine>",
        xml_escape(command_line)
    );
    envelope(
        ctx,
        ACTION_COMMAND,
        Some(shell_id),
        &[("WINRS_CONSOLEMODE_STDIN", "TRUE"), ("WINRS_SKIP_CMD_SHELL", "FALSE")],
        &body,
    )
}

/// Poll for output of a running command.
#[must_use]
pub fn receive(ctx: EnvelopeContext<'_>, shell_id: &str, command_id: &str) -> String {
    let body = format!(
        "<rsp:Receive><rsp:DesiredStream CommandId=\"{}\">stdout stderr</rsp:DesiredStream></rsp:Receive>",
        xml_escape(command_id)
    );
    envelope(ctx, ACTION_RECEIVE, Some(shell_id), &[], &body)
}

/// Terminate a command and release its resources.
#[must_use]
pub fn signal_terminate(ctx: EnvelopeContext<'_>, shell_id: &str, command_id: &str) -> String {
    let body = format!(
        "<rsp:Signal CommandId=\"{}\"><rsp:Code>{SIGNAL_TERMINATE}</rsp:Code></rsp:Signal>",
        xml_escape(command_id)
    );
    envelope(ctx, ACTION_SIGNAL, Some(shell_id), &[], &body)
}

/// Close a shell.
#[must_use]
pub fn delete_shell(ctx: EnvelopeContext<'_>, shell_id: &str) -> String {
    envelope(ctx, ACTION_DELETE, Some(shell_id), &[], "")
}

#[cfg(test)]
mod tests {
    use super::*;

    const CTX: EnvelopeContext<'static> = EnvelopeContext {
        endpoint: "http://win01:5985/wsman",
        operation_timeout_secs: 20,
    };

    #[test]
    fn test_xml_escape() {
        assert_eq!(xml_escape("plain"), "plain");
        assert_eq!(xml_escape("a<b & 'c'"), "a&lt;b &amp; &apos;c&apos;");
    }

    #[test]
    fn test_create_shell_carries_env() {
        let env = BTreeMap::from([("PATH_EXTRA".to_string(), "C:\\a&b".to_string())]);
        let xml = create_shell(CTX, &env);
        assert!(xml.contains(ACTION_CREATE));
        assert!(xml.contains("<rsp:Variable Name=\"PATH_EXTRA\">C:\\a&amp;b</rsp:Variable>"));
        assert!(xml.contains("<wsman:OperationTimeout>PT20S</wsman:OperationTimeout>"));
        assert!(!xml.contains("SelectorSet"));
    }

    #[test]
    fn test_command_escapes_line_and_selects_shell() {
        let xml = command(CTX, "SHELL-1", "dir & echo <x>");
        assert!(xml.contains("<wsman:Selector Name=\"ShellId\">SHELL-1</wsman:Selector>"));
        assert!(xml.contains("<rsp:Command>dir &amp; echo &lt;x&gt;</rsp:Command>"));
    }

    #[test]
    fn test_receive_and_signal_name_command() {
        assert!(receive(CTX, "S", "C-9").contains("CommandId=\"C-9\""));
        let signal = signal_terminate(CTX, "S", "C-9");
        assert!(signal.contains(ACTION_SIGNAL));
        assert!(signal.contains("signal/terminate"));
        assert!(delete_shell(CTX, "S").contains(ACTION_DELETE));
    }
}
