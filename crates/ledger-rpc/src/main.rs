mod cli;

use std::num::NonZeroUsize;
use std::time::Duration;

use clap::Parser;
use eyre::{bail, eyre, WrapErr};
use serde_json::json;

use ledger_rpc_core::rpc::{HttpTransport, HttpTransportConfig};
use ledger_rpc_core::{Batch, Error, ItemError, RpcClient};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let args = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_file(true)
        .with_line_number(true)
        .with_level(true)
        .init();

    let transport = HttpTransport::new(HttpTransportConfig {
        url: args.rpc_url.clone(),
        user: args.rpc_user.clone(),
        pass: args.rpc_pass.clone(),
        cookie_file: args.rpc_cookie_file.clone(),
        requests_per_second: args.rpc_requests_per_second,
        connect_timeout: Duration::from_secs(args.connect_timeout_secs),
        request_timeout: Duration::from_secs(args.timeout_secs),
    })
    .context("configure RPC transport")?;
    tracing::info!(url = %transport.url(), "using RPC endpoint");

    let mut client = RpcClient::new(transport);
    if let Some(size) = args.batch_chunk_size {
        let size = NonZeroUsize::new(size)
            .ok_or_else(|| eyre!("--batch-chunk-size must be at least 1"))?;
        client = client.with_batch_chunk_size(size);
    }

    let output = match args.command {
        cli::Command::Call { method, params } => {
            let params = params.iter().map(|p| parse_param(p)).collect();
            client
                .call::<serde_json::Value>(&method, params)
                .await
                .map_err(|err| eyre!(describe_call_error(&args.rpc_url, &err)))
                .wrap_err_with(|| format!("while calling `{method}`"))?
        }
        cli::Command::Batch { calls } => {
            let calls = parse_batch_calls(&calls)?;
            tracing::info!(calls = calls.len(), "sending batch");

            let mut batch = Batch::new();
            let slots: Vec<_> = calls
                .into_iter()
                .map(|(method, params)| batch.push::<serde_json::Value>(method, params))
                .collect();
            let mut outcomes = client
                .call_batch(batch)
                .await
                .map_err(|err| eyre!(describe_call_error(&args.rpc_url, &err)))
                .wrap_err("while sending batch")?;

            let rendered: Vec<serde_json::Value> = slots
                .into_iter()
                .map(|slot| render_outcome(outcomes.take(slot)))
                .collect();
            serde_json::Value::Array(rendered)
        }
    };

    println!(
        "{}",
        serde_json::to_string_pretty(&output).context("render result as JSON")?
    );
    Ok(())
}

/// Interpret a CLI param as JSON, falling back to a plain string so that
/// addresses and other bare words need no quoting.
fn parse_param(raw: &str) -> serde_json::Value {
    serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_owned()))
}

fn parse_batch_calls(input: &str) -> eyre::Result<Vec<(String, Vec<serde_json::Value>)>> {
    let text = match input.strip_prefix('@') {
        Some(path) => {
            std::fs::read_to_string(path).with_context(|| format!("read batch file `{path}`"))?
        }
        None => input.to_owned(),
    };

    let decoded: serde_json::Value =
        serde_json::from_str(&text).context("batch must be a JSON array")?;
    let Some(entries) = decoded.as_array() else {
        bail!("batch must be a JSON array of [method, params] pairs");
    };

    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| match entry {
            serde_json::Value::Array(pair) => {
                let method = pair
                    .first()
                    .and_then(serde_json::Value::as_str)
                    .ok_or_else(|| eyre!("batch entry {index}: method must be a string"))?;
                let params = match pair.get(1) {
                    None | Some(serde_json::Value::Null) => Vec::new(),
                    Some(serde_json::Value::Array(params)) => params.clone(),
                    Some(other) => {
                        bail!("batch entry {index}: params must be an array, got {other}")
                    }
                };
                Ok((method.to_owned(), params))
            }
            serde_json::Value::String(method) => Ok((method.clone(), Vec::new())),
            other => Err(eyre!(
                "batch entry {index}: expected [method, params] or method name, got {other}"
            )),
        })
        .collect()
}

fn render_outcome(outcome: Result<serde_json::Value, ItemError>) -> serde_json::Value {
    match outcome {
        Ok(result) => json!({ "result": result }),
        Err(ItemError::Rpc {
            code,
            message,
            data,
        }) => json!({ "error": { "code": code, "message": message, "data": data } }),
        Err(other) => json!({ "error": { "message": other.to_string() } }),
    }
}

fn describe_call_error(rpc_url: &str, err: &Error) -> String {
    let mut lines = vec![format!("RPC request to `{rpc_url}` failed: {err}")];

    let source_error = err.to_string();
    match err {
        Error::Transport(_) if source_error.contains("dns error") => lines.push(
            "hint: hostname resolution failed; verify the endpoint hostname and your DNS/network"
                .into(),
        ),
        Error::Transport(_)
            if source_error.contains("certificate") || source_error.contains("tls") =>
        {
            lines.push(
                "hint: TLS handshake failed; verify certificate trust and that the endpoint uses HTTPS"
                    .into(),
            )
        }
        Error::Transport(_) if source_error.contains("401") || source_error.contains("403") => {
            lines.push(
                "hint: authentication failed; verify --rpc-user/--rpc-pass or the cookie file"
                    .into(),
            )
        }
        Error::Transport(_) if source_error.contains("429") => lines.push(
            "hint: the node is rate limiting; lower --rpc-requests-per-second".into(),
        ),
        Error::Protocol(_) => lines.push(
            "hint: the endpoint did not answer with a JSON-RPC batch; verify the URL points at a JSON-RPC node"
                .into(),
        ),
        _ => {}
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_fall_back_to_strings() {
        assert_eq!(parse_param("10"), json!(10));
        assert_eq!(
            parse_param(r#"{"commitment":"recent"}"#),
            json!({"commitment": "recent"})
        );
        assert_eq!(
            parse_param("HWbsF542VSCxdGKcHrXuvJJnpwCEewmzdsG6KTxXMRRk"),
            json!("HWbsF542VSCxdGKcHrXuvJJnpwCEewmzdsG6KTxXMRRk")
        );
    }

    #[test]
    fn batch_calls_accept_pairs_and_bare_methods() {
        let calls = parse_batch_calls(
            r#"[["getConfirmedBlocksWithLimit", [131421172, 10]], "getBlockHeight", ["getSlot"]]"#,
        )
        .expect("valid batch");
        assert_eq!(
            calls,
            vec![
                (
                    "getConfirmedBlocksWithLimit".to_owned(),
                    vec![json!(131421172), json!(10)]
                ),
                ("getBlockHeight".to_owned(), vec![]),
                ("getSlot".to_owned(), vec![]),
            ]
        );
    }

    #[test]
    fn batch_calls_reject_non_array_params() {
        let err = parse_batch_calls(r#"[["getBalance", "addr"]]"#).expect_err("bad params");
        assert!(err.to_string().contains("params must be an array"));
    }

    #[test]
    fn batch_calls_reject_object_payload() {
        assert!(parse_batch_calls(r#"{"method": "getBlockHeight"}"#).is_err());
    }

    #[test]
    fn rpc_errors_render_with_code() {
        let rendered = render_outcome(Err(ItemError::Rpc {
            code: -32602,
            message: "Invalid param".to_owned(),
            data: None,
        }));
        assert_eq!(rendered["error"]["code"], json!(-32602));
    }

    #[test]
    fn protocol_errors_get_a_hint() {
        let message = describe_call_error(
            "http://127.0.0.1:8899",
            &Error::Protocol("expected a JSON array".to_owned()),
        );
        assert!(message.contains("hint: the endpoint did not answer"));
    }
}
