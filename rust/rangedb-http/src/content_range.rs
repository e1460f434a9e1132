use rangedb_common::{Result, error::Error};

/// A parsed `Content-Range: bytes A-B/T` header value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentRange {
    pub start: u64,
    /// Inclusive.
    pub end: u64,
    /// Total length of the resource, `None` when the server sent `*`.
    pub total: Option<u64>,
}

impl ContentRange {
    pub fn parse(value: &str) -> Result<ContentRange> {
        let value = value.trim();
        let (unit, rest) = value
            .split_once(' ')
            .ok_or_else(|| Error::protocol(format!("invalid Content-Range '{value}'")))?;
        if !unit.eq_ignore_ascii_case("bytes") {
            return Err(Error::protocol(format!(
                "unsupported Content-Range unit '{unit}'"
            )));
        }
        let (span, total) = rest
            .trim()
            .split_once('/')
            .ok_or_else(|| Error::protocol(format!("invalid Content-Range '{value}'")))?;
        let (start, end) = span
            .split_once('-')
            .ok_or_else(|| Error::protocol(format!("unsatisfied Content-Range '{value}'")))?;
        let number = |s: &str| {
            s.trim()
                .parse::<u64>()
                .map_err(|_| Error::protocol(format!("invalid Content-Range '{value}'")))
        };
        let start = number(start)?;
        let end = number(end)?;
        let total = match total.trim() {
            "*" => None,
            t => Some(number(t)?),
        };
        if end < start {
            return Err(Error::protocol(format!(
                "inverted Content-Range '{value}'"
            )));
        }
        let range = ContentRange { start, end, total };
        range.payload_len()?;
        Ok(range)
    }

    /// Payload size announced by the range.
    ///
    /// # Errors
    ///
    /// Fails with a protocol error if the range does not describe a representable
    /// byte count.
    pub fn payload_len(&self) -> Result<u64> {
        self.end
            .checked_sub(self.start)
            .and_then(|n| n.checked_add(1))
            .ok_or_else(|| {
                Error::protocol(format!(
                    "Content-Range bytes {}-{} has no representable length",
                    self.start, self.end
                ))
            })
    }

    /// Total resource length, falling back to the end of this range when the server
    /// did not disclose it.
    pub fn total_or_end(&self) -> Result<u64> {
        match self.total {
            Some(total) => Ok(total),
            None => self.end.checked_add(1).ok_or_else(|| {
                Error::protocol(format!("Content-Range end {} overflows", self.end))
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ContentRange;

    #[test]
    fn test_parse() {
        let range = ContentRange::parse("bytes 100-150/1270").expect("parse");
        assert_eq!(
            range,
            ContentRange {
                start: 100,
                end: 150,
                total: Some(1270)
            }
        );
        assert_eq!(range.payload_len().expect("len"), 51);
        assert_eq!(
            ContentRange::parse("bytes 0-9/*").expect("parse").total,
            None
        );
    }

    #[test]
    fn test_rejects_invalid() {
        for value in [
            "items 0-9/10",
            "bytes */1270",
            "bytes 9-0/10",
            "bytes 0-x/10",
            "bytes",
            "bytes 0-18446744073709551615/5",
            "bytes 0-18446744073709551615/*",
        ] {
            let err = ContentRange::parse(value).unwrap_err();
            assert!(
                err.to_string().starts_with("protocol error"),
                "{value}: {err}"
            );
        }
    }

    #[test]
    fn test_checked_lengths() {
        let range = ContentRange {
            start: 10,
            end: u64::MAX,
            total: None,
        };
        assert!(range.payload_len().is_err());
        assert!(range.total_or_end().is_err());

        let range = ContentRange {
            start: 0,
            end: u64::MAX - 1,
            total: None,
        };
        assert_eq!(range.payload_len().expect("len"), u64::MAX);
        assert_eq!(range.total_or_end().expect("total"), u64::MAX);
    }
}
