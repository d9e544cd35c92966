//! Verified-source acquisition through the Etherscan v2 API.

use anyhow::{anyhow, bail, Context, Result};
use serde_json::Value;

const API_URL: &str = "https://api.etherscan.io/v2/api";

pub async fn fetch_verified_source(address: &str) -> Result<String> {
    let api_key = std::env::var("ETHERSCAN_API_KEY")
        .context("set ETHERSCAN_API_KEY to analyze contracts by address")?;

    let client = reqwest::Client::new();
    let response: Value = client
        .get(API_URL)
        .query(&[
            ("chainid", "1"),
            ("module", "contract"),
            ("action", "getsourcecode"),
            ("address", address),
            ("apikey", api_key.as_str()),
        ])
        .send()
        .await
        .context("Etherscan request failed")?
        .json()
        .await
        .context("Etherscan returned a malformed response")?;

    if response["status"] != "1" {
        bail!("Etherscan error: {}", response["message"]);
    }

    let source = response["result"][0]["SourceCode"]
        .as_str()
        .ok_or_else(|| anyhow!("no source code in Etherscan response for {address}"))?;
    if source.is_empty() {
        bail!("contract {address} has no verified source");
    }

    Ok(flatten_multi_file(source))
}

/// Multi-file verified uploads come back as a JSON object (sometimes wrapped
/// in doubled braces) mapping paths to `{ "content": ... }`. Flatten all
/// units into one analyzable text; plain single-file sources pass through.
fn flatten_multi_file(source: &str) -> String {
    if !source.starts_with('{') {
        return source.to_string();
    }

    let body = if source.starts_with("{{") && source.ends_with("}}") && source.len() >= 4 {
        &source[1..source.len() - 1]
    } else {
        source
    };

    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return source.to_string();
    };

    let files = value
        .get("sources")
        .and_then(Value::as_object)
        .or_else(|| value.as_object());

    match files {
        Some(files) => {
            let contents: Vec<&str> = files
                .values()
                .filter_map(|entry| entry.get("content").and_then(Value::as_str))
                .collect();
            if contents.is_empty() {
                source.to_string()
            } else {
                contents.join("\n")
            }
        }
        None => source.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_file_source_passes_through() {
        let source = "contract A {}";
        assert_eq!(flatten_multi_file(source), source);
    }

    #[test]
    fn double_braced_multi_file_source_is_flattened() {
        let wrapped = r#"{{"language":"Solidity","sources":{"A.sol":{"content":"contract A {}"},"B.sol":{"content":"contract B {}"}}}}"#;
        let flat = flatten_multi_file(wrapped);
        assert!(flat.contains("contract A {}"));
        assert!(flat.contains("contract B {}"));
    }

    #[test]
    fn bare_path_map_is_flattened() {
        let wrapped = r#"{"A.sol":{"content":"contract A {}"}}"#;
        assert_eq!(flatten_multi_file(wrapped), "contract A {}");
    }
}
