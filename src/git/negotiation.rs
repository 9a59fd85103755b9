use crate::git::capability::Capabilities;
use crate::git::pkt_line::{delim, encode, flush};
use bytes::{BufMut, BytesMut};

pub const DEFAULT_HAVE_LOOKBACK: usize = 20;

/// One `want`: either a ref name (resolved to `refs/heads/<name>` if bare)
/// or a 40-hex-char sha1, sent as-is.
fn want_target(reference: &str) -> String {
    if reference.len() == 40 && reference.bytes().all(|b| b.is_ascii_hexdigit()) {
        reference.to_string()
    } else if reference.starts_with("refs/") {
        reference.to_string()
    } else {
        format!("refs/heads/{reference}")
    }
}

/// Parameters for one `fetch` negotiation round, supplied by the caller —
/// this core holds no global configuration, matching the ambient-stack
/// design note against a singleton config.
pub struct FetchRequest {
    pub wants: Vec<String>,
    pub depth: Option<u32>,
    pub haves: Vec<String>,
    pub have_lookback: usize,
}

impl FetchRequest {
    pub fn new(wants: Vec<String>) -> Self {
        FetchRequest {
            wants,
            depth: None,
            haves: Vec::new(),
            have_lookback: DEFAULT_HAVE_LOOKBACK,
        }
    }

    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = Some(depth);
        self
    }

    pub fn with_haves(mut self, haves: Vec<String>) -> Self {
        self.haves = haves;
        self
    }

    /// Builds the pkt-line request body: `command=fetch`, capability lines,
    /// `want`/`deepen` lines, a delim-pkt, bounded `have` lines, `done`, and
    /// a final flush-pkt.
    pub fn build_body(&self) -> BytesMut {
        let mut buf = BytesMut::new();
        buf.put(encode(b"command=fetch\n"));
        for cap in Capabilities::as_lines() {
            buf.put(encode(format!("{cap}\n").as_bytes()));
        }
        for want in &self.wants {
            buf.put(encode(format!("want {}\n", want_target(want)).as_bytes()));
        }
        if let Some(depth) = self.depth {
            buf.put(encode(format!("deepen {depth}\n").as_bytes()));
        }
        buf.put(delim());
        for have in self.haves.iter().take(self.have_lookback) {
            buf.put(encode(format!("have {have}\n").as_bytes()));
        }
        buf.put(encode(b"done\n"));
        buf.put(flush());
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_bare_name_to_refs_heads() {
        assert_eq!(want_target("master"), "refs/heads/master");
    }

    #[test]
    fn leaves_refs_prefixed_names_alone() {
        assert_eq!(want_target("refs/tags/v1"), "refs/tags/v1");
    }

    #[test]
    fn treats_40_hex_chars_as_a_sha1() {
        let sha = "a".repeat(40);
        assert_eq!(want_target(&sha), sha);
    }

    #[test]
    fn builds_expected_body_shape() {
        let request = FetchRequest::new(vec!["refs/heads/master".to_string()]).with_depth(1);
        let body = request.build_body();
        let text = String::from_utf8_lossy(&body);

        assert!(text.contains("0011command=fetch\n"));
        assert!(text.contains("side-band-64k"));
        assert!(text.contains("want refs/heads/master"));
        assert!(text.contains("deepen 1\n"));
        assert!(text.ends_with("done\n0000"));
        assert!(text.contains("0001")); // delim-pkt precedes the have section
    }

    #[test]
    fn bounds_have_lines_to_lookback() {
        let haves: Vec<String> = (0..30).map(|i| format!("{i:040}")).collect();
        let request = FetchRequest::new(vec!["master".to_string()]).with_haves(haves.clone());
        let body = request.build_body();
        let text = String::from_utf8_lossy(&body);
        let have_count = text.matches("have ").count();
        assert_eq!(have_count, DEFAULT_HAVE_LOOKBACK);
    }
}
