#![allow(dead_code)]

pub mod mock_server;

use std::path::Path;

/// Write `headers.json` and `cookies.json` into `dir` and return their paths.
pub fn write_credentials(dir: &Path) -> (std::path::PathBuf, std::path::PathBuf) {
    let headers = dir.join("headers.json");
    let cookies = dir.join("cookies.json");
    std::fs::write(&headers, br#"{"User-Agent": "wtdl-test", "X-Api-Version": 2, "X-Empty": ""}"#).unwrap();
    std::fs::write(&cookies, br#"{"session": "abc123", "remember": true}"#).unwrap();
    (headers, cookies)
}

/// JSON body of one API item whose instructions are `instructions`.
pub fn item_body(instructions: &str) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({ "data": { "instructions": instructions } })).unwrap()
}
