//! Request/response analysis over raw HTTP/1.x bytes.

use chrono::{DateTime, NaiveDateTime, Utc};
use log::trace;
use url::Url;

use super::mime::{inferred_mime_type, stated_mime_type};
use super::{
    content_type_code, param_code, CookieInfo, ExchangeAnalyzer, HttpService, ParameterInfo,
    RequestInfo, ResponseInfo,
};

/// Default [`ExchangeAnalyzer`] working directly on the captured bytes.
///
/// Lenient by construction: a missing blank line puts the body offset at the
/// end of the message, an unreadable start line yields an empty method and a
/// zero status, and undecodable bytes are replaced rather than rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpAnalyzer;

impl HttpAnalyzer {
    pub fn new() -> Self {
        HttpAnalyzer
    }
}

impl ExchangeAnalyzer for HttpAnalyzer {
    fn analyze_request(&self, service: &HttpService, request: &[u8]) -> RequestInfo {
        let (head, body_offset) = split_head(request);
        let headers = head_lines(head);
        let body = &request[body_offset.min(request.len())..];

        let mut start = headers.first().map(String::as_str).unwrap_or("").split_whitespace();
        let method = start.next().unwrap_or("").to_string();
        let target = start.next().unwrap_or("/");
        let url = build_url(service, target);

        let content_type = header_value(&headers, "content-type");
        let content_type_code = classify_request_content_type(content_type);

        let mut parameters = Vec::new();
        if let Ok(parsed) = Url::parse(&url) {
            for (name, value) in parsed.query_pairs() {
                parameters.push(param(param_code::URL, &name, &value));
            }
        }
        for cookie_header in header_values(&headers, "cookie") {
            for pair in cookie_header.split(';') {
                let pair = pair.trim();
                if pair.is_empty() {
                    continue;
                }
                let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
                parameters.push(param(param_code::COOKIE, name.trim(), value.trim()));
            }
        }
        parameters.extend(body_parameters(content_type_code, content_type, body));

        trace!(
            "Analyzed request {} {} ({} headers, {} parameters)",
            method,
            url,
            headers.len(),
            parameters.len()
        );

        RequestInfo {
            method,
            url,
            headers,
            body_offset,
            content_type_code,
            parameters,
        }
    }

    fn analyze_response(&self, response: &[u8]) -> ResponseInfo {
        let (head, body_offset) = split_head(response);
        let headers = head_lines(head);
        let body = &response[body_offset.min(response.len())..];

        let status_code = headers
            .first()
            .and_then(|line| line.split_whitespace().nth(1))
            .and_then(|code| code.parse::<u16>().ok())
            .unwrap_or(0);

        let stated_mime_type = stated_mime_type(header_value(&headers, "content-type"));
        let inferred_mime_type = inferred_mime_type(body);

        let now = Utc::now();
        let cookies = header_values(&headers, "set-cookie")
            .filter_map(|value| parse_set_cookie(value, now))
            .collect();

        ResponseInfo {
            status_code,
            headers,
            body_offset,
            stated_mime_type,
            inferred_mime_type,
            cookies,
        }
    }
}

fn param(type_code: i32, name: &str, value: &str) -> ParameterInfo {
    ParameterInfo {
        type_code,
        name: name.to_string(),
        value: value.to_string(),
    }
}

/// Splits a message at the first blank line. Returns the head and the body offset.
fn split_head(raw: &[u8]) -> (&[u8], usize) {
    let crlf = find(raw, b"\r\n\r\n").map(|i| (i, i + 4));
    let lf = find(raw, b"\n\n").map(|i| (i, i + 2));
    match crlf.into_iter().chain(lf).min_by_key(|&(i, _)| i) {
        Some((i, body)) => (&raw[..i], body),
        None => (raw, raw.len()),
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn head_lines(head: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(head)
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
        .filter(|line| !line.is_empty())
        .collect()
}

/// Values of every header called `name` (lowercase), skipping the start line.
fn header_values<'a>(lines: &'a [String], name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
    lines.iter().skip(1).filter_map(move |line| {
        let (n, v) = line.split_once(':')?;
        n.trim().eq_ignore_ascii_case(name).then(|| v.trim())
    })
}

fn header_value<'a>(lines: &'a [String], name: &'a str) -> Option<&'a str> {
    header_values(lines, name).next()
}

fn build_url(service: &HttpService, target: &str) -> String {
    let lower = target.to_ascii_lowercase();
    let candidate = if lower.starts_with("http://") || lower.starts_with("https://") {
        target.to_string()
    } else if target.starts_with('/') {
        format!("{}://{}{}", service.protocol, authority(service), target)
    } else {
        // authority-form (CONNECT) or asterisk-form
        format!("{}://{}/", service.protocol, authority(service))
    };

    match Url::parse(&candidate) {
        Ok(url) => url.to_string(),
        Err(e) => {
            trace!("Keeping unparsable URL {candidate:?} verbatim: {e}");
            candidate
        }
    }
}

fn authority(service: &HttpService) -> String {
    if service.is_default_port() {
        service.host.clone()
    } else {
        format!("{}:{}", service.host, service.port)
    }
}

fn classify_request_content_type(content_type: Option<&str>) -> i32 {
    let Some(ct) = content_type else {
        return content_type_code::NONE;
    };
    let ct = ct.to_ascii_lowercase();
    if ct.contains("application/x-www-form-urlencoded") {
        content_type_code::URL_ENCODED
    } else if ct.starts_with("multipart/") {
        content_type_code::MULTIPART
    } else if ct.contains("json") {
        content_type_code::JSON
    } else if ct.contains("xml") {
        content_type_code::XML
    } else if ct.contains("amf") {
        content_type_code::AMF
    } else {
        content_type_code::UNKNOWN
    }
}

fn body_parameters(code: i32, content_type: Option<&str>, body: &[u8]) -> Vec<ParameterInfo> {
    if body.is_empty() {
        return Vec::new();
    }
    match code {
        content_type_code::URL_ENCODED => url::form_urlencoded::parse(body)
            .map(|(name, value)| param(param_code::BODY, &name, &value))
            .collect(),
        content_type_code::JSON => match serde_json::from_slice::<serde_json::Value>(body) {
            Ok(serde_json::Value::Object(members)) => members
                .iter()
                .map(|(name, value)| match value {
                    serde_json::Value::String(s) => param(param_code::JSON, name, s),
                    other => param(param_code::JSON, name, &other.to_string()),
                })
                .collect(),
            _ => Vec::new(),
        },
        content_type_code::MULTIPART => content_type
            .and_then(multipart_boundary)
            .map(|boundary| multipart_parameters(body, &boundary))
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

fn multipart_boundary(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|attr| {
        let (k, v) = attr.split_once('=')?;
        k.trim()
            .eq_ignore_ascii_case("boundary")
            .then(|| v.trim().trim_matches('"').to_string())
    })
}

fn multipart_parameters(body: &[u8], boundary: &str) -> Vec<ParameterInfo> {
    let text = String::from_utf8_lossy(body);
    let delimiter = format!("--{boundary}");
    let mut params = Vec::new();

    for part in text.split(delimiter.as_str()).skip(1) {
        if part.starts_with("--") {
            break;
        }
        let part = part.strip_prefix("\r\n").or_else(|| part.strip_prefix('\n')).unwrap_or(part);
        let (head, content) = match part.find("\r\n\r\n") {
            Some(i) => (&part[..i], &part[i + 4..]),
            None => match part.find("\n\n") {
                Some(i) => (&part[..i], &part[i + 2..]),
                None => continue,
            },
        };
        let content = content
            .strip_suffix("\r\n")
            .or_else(|| content.strip_suffix('\n'))
            .unwrap_or(content);

        let Some(disposition) = head.lines().find_map(|line| {
            let (n, v) = line.split_once(':')?;
            n.trim()
                .eq_ignore_ascii_case("content-disposition")
                .then_some(v)
        }) else {
            continue;
        };

        let mut name = None;
        let mut filename = None;
        for attr in disposition.split(';').skip(1) {
            if let Some((k, v)) = attr.split_once('=') {
                let v = v.trim().trim_matches('"');
                match k.trim().to_ascii_lowercase().as_str() {
                    "name" => name = Some(v.to_string()),
                    "filename" => filename = Some(v.to_string()),
                    _ => {}
                }
            }
        }

        if let Some(name) = name {
            params.push(param(param_code::BODY, &name, content));
        }
        if let Some(filename) = filename {
            params.push(param(param_code::MULTIPART_ATTR, "filename", &filename));
        }
    }
    params
}

/// Parses one `Set-Cookie` value. Returns `None` when there is no `name=value` pair.
fn parse_set_cookie(value: &str, now: DateTime<Utc>) -> Option<CookieInfo> {
    let mut parts = value.split(';');
    let (name, cookie_value) = parts.next()?.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    let mut cookie = CookieInfo {
        name: name.to_string(),
        value: cookie_value.trim().to_string(),
        domain: None,
        path: None,
        expiration_millis: None,
    };
    let mut max_age = None;

    for attr in parts {
        let (k, v) = attr.split_once('=').unwrap_or((attr, ""));
        let v = v.trim();
        match k.trim().to_ascii_lowercase().as_str() {
            "domain" if !v.is_empty() => cookie.domain = Some(v.to_string()),
            "path" if !v.is_empty() => cookie.path = Some(v.to_string()),
            "expires" => cookie.expiration_millis = parse_cookie_date(v),
            "max-age" => max_age = v.parse::<i64>().ok(),
            _ => {}
        }
    }

    // Max-Age wins over Expires
    if let Some(secs) = max_age {
        cookie.expiration_millis =
            Some(now.timestamp_millis().saturating_add(secs.saturating_mul(1000)));
    }
    Some(cookie)
}

fn parse_cookie_date(value: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.timestamp_millis());
    }
    ["%a, %d-%b-%Y %H:%M:%S GMT", "%a, %d-%b-%y %H:%M:%S GMT"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| naive.and_utc().timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> HttpService {
        HttpService::new("https", "shop.example.com", 443)
    }

    #[test]
    fn test_request_line_and_url() {
        let raw = b"GET /search?q=rust+lang&page=2 HTTP/1.1\r\nHost: shop.example.com\r\n\r\n";
        let info = HttpAnalyzer.analyze_request(&service(), raw);
        assert_eq!(info.method, "GET");
        assert_eq!(info.url, "https://shop.example.com/search?q=rust+lang&page=2");
        assert_eq!(info.headers[0], "GET /search?q=rust+lang&page=2 HTTP/1.1");
        assert_eq!(info.headers.len(), 2);
        assert_eq!(info.body_offset, raw.len());
        assert_eq!(info.content_type_code, content_type_code::NONE);
        assert_eq!(
            info.parameters,
            vec![
                param(param_code::URL, "q", "rust lang"),
                param(param_code::URL, "page", "2"),
            ]
        );
    }

    #[test]
    fn test_non_default_port_kept_in_url() {
        let svc = HttpService::new("http", "10.0.0.5", 8080);
        let info = HttpAnalyzer.analyze_request(&svc, b"GET /a HTTP/1.1\r\n\r\n");
        assert_eq!(info.url, "http://10.0.0.5:8080/a");
    }

    #[test]
    fn test_absolute_form_target() {
        let svc = HttpService::new("http", "proxy.local", 3128);
        let raw = b"GET http://other.example/x HTTP/1.1\r\n\r\n";
        let info = HttpAnalyzer.analyze_request(&svc, raw);
        assert_eq!(info.url, "http://other.example/x");
    }

    #[test]
    fn test_urlencoded_body_and_cookies() {
        let raw = b"POST /login HTTP/1.1\r\nHost: shop.example.com\r\nCookie: sid=abc; theme=dark\r\nContent-Type: application/x-www-form-urlencoded\r\n\r\nuser=alice&pass=s%3Dcret";
        let info = HttpAnalyzer.analyze_request(&service(), raw);
        assert_eq!(info.content_type_code, content_type_code::URL_ENCODED);
        assert_eq!(&raw[info.body_offset..], b"user=alice&pass=s%3Dcret");
        assert_eq!(
            info.parameters,
            vec![
                param(param_code::COOKIE, "sid", "abc"),
                param(param_code::COOKIE, "theme", "dark"),
                param(param_code::BODY, "user", "alice"),
                param(param_code::BODY, "pass", "s=cret"),
            ]
        );
    }

    #[test]
    fn test_json_body_parameters() {
        let raw = b"POST /api HTTP/1.1\r\nContent-Type: application/json\r\n\r\n{\"id\": 7, \"name\": \"bob\"}";
        let info = HttpAnalyzer.analyze_request(&service(), raw);
        assert_eq!(info.content_type_code, content_type_code::JSON);
        assert!(info.parameters.contains(&param(param_code::JSON, "id", "7")));
        assert!(info.parameters.contains(&param(param_code::JSON, "name", "bob")));
    }

    #[test]
    fn test_multipart_body_parameters() {
        let raw = b"POST /upload HTTP/1.1\r\nContent-Type: multipart/form-data; boundary=XyZ\r\n\r\n--XyZ\r\nContent-Disposition: form-data; name=\"title\"\r\n\r\nholiday\r\n--XyZ\r\nContent-Disposition: form-data; name=\"file\"; filename=\"a.png\"\r\nContent-Type: image/png\r\n\r\nPNGDATA\r\n--XyZ--\r\n";
        let info = HttpAnalyzer.analyze_request(&service(), raw);
        assert_eq!(info.content_type_code, content_type_code::MULTIPART);
        assert_eq!(
            info.parameters,
            vec![
                param(param_code::BODY, "title", "holiday"),
                param(param_code::BODY, "file", "PNGDATA"),
                param(param_code::MULTIPART_ATTR, "filename", "a.png"),
            ]
        );
    }

    #[test]
    fn test_request_content_type_codes() {
        assert_eq!(classify_request_content_type(None), content_type_code::NONE);
        assert_eq!(
            classify_request_content_type(Some("text/xml")),
            content_type_code::XML
        );
        assert_eq!(
            classify_request_content_type(Some("application/x-amf")),
            content_type_code::AMF
        );
        assert_eq!(
            classify_request_content_type(Some("application/octet-stream")),
            content_type_code::UNKNOWN
        );
    }

    #[test]
    fn test_response_analysis() {
        let raw = b"HTTP/1.1 404 Not Found\r\nContent-Type: text/html\r\nSet-Cookie: sid=1; Path=/; Domain=.example.com; Expires=Wed, 21 Oct 2015 07:28:00 GMT\r\nSet-Cookie: broken\r\n\r\n<html>nope</html>";
        let info = HttpAnalyzer.analyze_response(raw);
        assert_eq!(info.status_code, 404);
        assert_eq!(info.stated_mime_type, "HTML");
        assert_eq!(info.inferred_mime_type, "HTML");
        assert_eq!(&raw[info.body_offset..], b"<html>nope</html>");
        assert_eq!(info.cookies.len(), 1);
        let cookie = &info.cookies[0];
        assert_eq!(cookie.name, "sid");
        assert_eq!(cookie.domain.as_deref(), Some(".example.com"));
        assert_eq!(cookie.path.as_deref(), Some("/"));
        assert_eq!(cookie.expiration_millis, Some(1_445_412_480_000));
    }

    #[test]
    fn test_cookie_max_age_wins() {
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let cookie =
            parse_set_cookie("a=b; Expires=Wed, 21 Oct 2015 07:28:00 GMT; Max-Age=60", now).unwrap();
        assert_eq!(cookie.expiration_millis, Some(1_700_000_060_000));
    }

    #[test]
    fn test_cookie_dashed_expires_format() {
        let now = Utc::now();
        let cookie = parse_set_cookie("a=b; expires=Wed, 21-Oct-2015 07:28:00 GMT", now).unwrap();
        assert_eq!(cookie.expiration_millis, Some(1_445_412_480_000));
    }

    #[test]
    fn test_garbage_response_does_not_panic() {
        let info = HttpAnalyzer.analyze_response(b"\xff\xfe garbage without structure");
        assert_eq!(info.status_code, 0);
        assert!(info.cookies.is_empty());
        assert_eq!(info.headers.len(), 1);
    }

    #[test]
    fn test_lf_only_messages() {
        let raw = b"HTTP/1.0 200 OK\nContent-Type: application/json\n\n{\"ok\":true}";
        let info = HttpAnalyzer.analyze_response(raw);
        assert_eq!(info.status_code, 200);
        assert_eq!(&raw[info.body_offset..], b"{\"ok\":true}");
        assert_eq!(info.stated_mime_type, "JSON");
    }

    #[test]
    fn test_lf_head_with_crlf_blank_line_in_body() {
        let raw = b"HTTP/1.1 200 OK\nContent-Type: text/plain\n\nline1\r\n\r\nline2";
        let info = HttpAnalyzer.analyze_response(raw);
        assert_eq!(info.headers, vec!["HTTP/1.1 200 OK", "Content-Type: text/plain"]);
        assert_eq!(&raw[info.body_offset..], b"line1\r\n\r\nline2");
    }

    #[test]
    fn test_default_port_left_out_of_unparsable_url() {
        let svc = HttpService::new("https", "bad host", 443);
        let info = HttpAnalyzer.analyze_request(&svc, b"GET /x HTTP/1.1\r\n\r\n");
        assert_eq!(info.url, "https://bad host/x");
    }
}
