use tracing::debug;
use url::Url;

/// path the proxy is mounted at, rewritten playlist lines point back here
pub const PROXY_PATH: &str = "/proxy";

pub const PLAYLIST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl; charset=utf-8";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    /// m3u8 text that gets rewritten
    Playlist,
    /// everything else, streamed through untouched
    Opaque,
}

/// playlist if the upstream says it's some flavour of mpegurl (apple and x- both contain it) or
/// the url we asked for ends in .m3u8, a lot of cdns serve playlists as octet-stream or text/plain
pub fn classify(content_type: Option<&str>, target: &Url) -> ResponseKind {
    let mime_says_playlist = content_type
        .map(|ct| ct.to_ascii_lowercase().contains("mpegurl"))
        .unwrap_or(false);

    if mime_says_playlist || has_m3u8_suffix(target.as_str()) || has_m3u8_suffix(target.path()) {
        ResponseKind::Playlist
    } else {
        ResponseKind::Opaque
    }
}

fn has_m3u8_suffix(s: &str) -> bool {
    s.len() >= 5
        && s.is_char_boundary(s.len() - 5)
        && s[s.len() - 5..].eq_ignore_ascii_case(".m3u8")
}

/// wraps an absolute url so it's fetched through this proxy
pub fn proxied_url(base_origin: &str, target: &Url) -> String {
    format!(
        "{}{}?url={}",
        base_origin,
        PROXY_PATH,
        urlencoding::encode(target.as_str())
    )
}

/// resolves a single uri line against the playlist it came from
pub fn resolve_line(line: &str, playlist_url: &Url) -> Result<Url, url::ParseError> {
    playlist_url.join(line)
}

/// rewrites every uri line of a playlist to go back through the proxy
///
/// tags and comments (anything starting with #) and blank lines are left exactly as they are,
/// including #EXT-X-KEY / #EXT-X-MAP uri attributes. every other line is resolved against the
/// playlist url (relative, root relative, scheme relative and absolute all go through
/// `Url::join`) and replaced with `{base_origin}/proxy?url=<encoded>`. lines that don't resolve
/// are kept as is so one bad line doesn't break the whole playlist.
///
/// sub playlists aren't fetched here, the player asks for them through the proxy and they get
/// rewritten on that request
pub fn rewrite_playlist(text: &str, playlist_url: &Url, base_origin: &str) -> String {
    let base_origin = base_origin.trim_end_matches('/');

    text.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .map(|line| {
            let trimmed = line.trim();

            if trimmed.is_empty() || trimmed.starts_with('#') {
                return line.to_string();
            }

            match resolve_line(trimmed, playlist_url) {
                Ok(resolved) => proxied_url(base_origin, &resolved),
                Err(e) => {
                    debug!("Leaving unresolvable playlist line as is: {} - {}", trimmed, e);
                    line.to_string()
                }
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
