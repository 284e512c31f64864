use std::io::Write;

use flate2::{Compression, write::GzEncoder};

/// encodings the rewritten playlists can be sent with
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ContentEncoding {
    Zstd,
    Gzip,
    None,
}

impl ContentEncoding {
    /// picks the best encoding the client accepts, apple HLS players send "gzip, deflate" or
    /// "identity" so zstd mostly ends up going to browsers
    pub fn from_accept_encoding(accept_encoding: Option<&str>) -> Self {
        let Some(value) = accept_encoding else {
            return Self::None;
        };

        let accepted: Vec<&str> = value
            .split(',')
            .filter_map(|part| {
                let mut params = part.split(';');
                let coding = params.next()?.trim();
                // gzip;q=0 means "never gzip"
                let refused = params.any(|p| {
                    p.trim()
                        .strip_prefix("q=")
                        .and_then(|q| q.trim().parse::<f32>().ok())
                        .is_some_and(|q| q <= 0.0)
                });
                (!refused && !coding.is_empty()).then_some(coding)
            })
            .collect();

        if accepted.iter().any(|c| c.eq_ignore_ascii_case("zstd")) {
            Self::Zstd
        } else if accepted
            .iter()
            .any(|c| c.eq_ignore_ascii_case("gzip") || c.eq_ignore_ascii_case("x-gzip"))
        {
            Self::Gzip
        } else {
            Self::None
        }
    }

    pub fn as_header_value(&self) -> Option<&'static str> {
        match self {
            Self::Zstd => Some("zstd"),
            Self::Gzip => Some("gzip"),
            Self::None => None,
        }
    }

    pub fn compress(&self, data: &[u8]) -> Result<Vec<u8>, std::io::Error> {
        match self {
            Self::Zstd => zstd::encode_all(data, 3),
            Self::Gzip => {
                let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(data)?;
                encoder.finish()
            }
            Self::None => Ok(data.to_vec()),
        }
    }
}
