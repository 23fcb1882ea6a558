// Field extraction from machine-readable registry (whois -m) output

use regex::Regex;
use std::sync::LazyLock;

static ROUTE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^route6?:[ \t]+(\S.*?)\s*$").expect("valid route regex"));
static ORIGIN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^origin:[ \t]+(\S.*?)\s*$").expect("valid origin regex"));
static AS_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^as-name:[ \t]+(\S.*?)\s*$").expect("valid as-name regex"));
static DESCR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^descr:[ \t]+(\S.*?)\s*$").expect("valid descr regex"));

fn first_match(re: &Regex, output: &str) -> Option<String> {
    re.captures(output)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// First `route:` or `route6:` value in the output
pub fn parse_route(output: &str) -> Option<String> {
    first_match(&ROUTE_RE, output)
}

/// First `origin:` value in the output
pub fn parse_origin(output: &str) -> Option<String> {
    first_match(&ORIGIN_RE, output)
}

/// Network name from an ASN query: `as-name:`, falling back to `descr:`
pub fn parse_owner(output: &str) -> Option<String> {
    first_match(&AS_NAME_RE, output).or_else(|| first_match(&DESCR_RE, output))
}
