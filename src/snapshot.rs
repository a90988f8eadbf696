// `<ordinal>|bm=<0|1>|<ids>`, one line per query in encounter order.

use std::fmt;
use std::io::{self, Write};
use std::sync::LazyLock;

use regex::Regex;

static LINE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)\|bm=([01])\|(.*)$").expect("result line pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultSnapshot {
    pub ordinal: u64,
    pub best_match: bool,
    pub ids: Vec<String>,
}

impl ResultSnapshot {
    pub fn best_match_flag(&self) -> u8 {
        u8::from(self.best_match)
    }

    pub fn parse(line: &str) -> Option<Self> {
        let captures = LINE_PATTERN.captures(line)?;
        let ordinal = captures.get(1)?.as_str().parse::<u64>().ok()?;
        let best_match = captures.get(2)?.as_str() == "1";
        let ids = match captures.get(3)?.as_str() {
            "" => Vec::new(),
            joined => joined.split(',').map(ToOwned::to_owned).collect(),
        };

        Some(Self {
            ordinal,
            best_match,
            ids,
        })
    }
}

impl fmt::Display for ResultSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|bm={}|{}",
            self.ordinal,
            self.best_match_flag(),
            self.ids.join(",")
        )
    }
}

pub struct ResultSink<W: Write> {
    writer: W,
    lines: usize,
}

impl<W: Write> ResultSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, lines: 0 }
    }

    pub fn append(&mut self, snapshot: &ResultSnapshot) -> io::Result<()> {
        writeln!(self.writer, "{snapshot}")?;
        self.lines += 1;
        Ok(())
    }

    pub fn lines_written(&self) -> usize {
        self.lines
    }

    pub fn finish(mut self) -> io::Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_line_format() {
        let snapshot = ResultSnapshot {
            ordinal: 12,
            best_match: true,
            ids: vec!["10".to_string(), "20".to_string(), "30".to_string()],
        };
        assert_eq!(snapshot.to_string(), "12|bm=1|10,20,30");
        assert_eq!(ResultSnapshot::parse("12|bm=1|10,20,30"), Some(snapshot));
    }

    #[test]
    fn parse_accepts_empty_id_list() {
        let snapshot = ResultSnapshot::parse("3|bm=0|").expect("empty result line");
        assert_eq!(snapshot.ordinal, 3);
        assert!(!snapshot.best_match);
        assert!(snapshot.ids.is_empty());
    }

    #[test]
    fn parse_rejects_other_shapes() {
        assert_eq!(ResultSnapshot::parse("x|bm=1|1,2"), None);
        assert_eq!(ResultSnapshot::parse("1|bm=2|1,2"), None);
        assert_eq!(ResultSnapshot::parse("1|1,2"), None);
    }

    #[test]
    fn sink_appends_one_line_per_snapshot() {
        let mut sink = ResultSink::new(Vec::new());
        for ordinal in 1..=2 {
            sink.append(&ResultSnapshot {
                ordinal,
                best_match: false,
                ids: vec![format!("id{ordinal}")],
            })
            .expect("append");
        }
        assert_eq!(sink.lines_written(), 2);

        let written = sink.finish().expect("flush");
        assert_eq!(String::from_utf8(written).expect("utf8"), "1|bm=0|id1\n2|bm=0|id2\n");
    }
}
