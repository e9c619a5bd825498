// SPDX-FileCopyrightText: 2026 Marquee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Property tests for the request reader.

use marquee_server::{Limits, ParseError, read_request};
use proptest::prelude::*;

fn limits() -> Limits {
    Limits {
        max_header_lines: 16,
        max_line_bytes: 512,
        max_body_bytes: 256,
    }
}

fn parse(raw: &[u8]) -> Result<marquee_server::Request, ParseError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    runtime.block_on(async {
        let mut reader = raw;
        read_request(&mut reader, &limits()).await
    })
}

proptest! {
    #[test]
    fn arbitrary_bytes_never_panic(raw in proptest::collection::vec(any::<u8>(), 0..2048)) {
        let _ = parse(&raw);
    }

    #[test]
    fn well_formed_requests_parse(
        method in "(GET|POST|PUT)",
        path in "/[a-z0-9/]{0,40}",
        agent in "[a-zA-Z0-9 ./]{1,30}",
        body in "[ -~]{0,256}",
    ) {
        let raw = format!(
            "{method} {path} HTTP/1.1\r\nUser-Agent: {agent}\r\nContent-Length: {}\r\n\r\n{body}",
            body.len()
        );
        let req = parse(raw.as_bytes()).unwrap();
        prop_assert_eq!(req.method, method);
        prop_assert_eq!(req.path, path);
        prop_assert_eq!(req.user_agent.as_deref(), Some(agent.trim()));
        prop_assert_eq!(req.body, body.into_bytes());
    }

    #[test]
    fn declared_length_over_limit_is_rejected(extra in 1usize..10_000) {
        let raw = format!("POST /x HTTP/1.1\r\nContent-Length: {}\r\n\r\n", 256 + extra);
        prop_assert!(
            matches!(parse(raw.as_bytes()), Err(ParseError::TooLarge { .. })),
            "expected too-large rejection"
        );
    }
}
