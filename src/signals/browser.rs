// src/browser.rs
// Outdated browser detection for WASM Bot Defence

pub fn is_outdated_browser(user_agent: &str, block_list: &[(String, u32)]) -> bool {
    for (name, min_version) in block_list {
        if let Some(ver) = extract_version(user_agent, name) {
            if ver < *min_version {
                return true;
            }
        }
    }
    false
}

pub fn extract_version(ua: &str, name: &str) -> Option<u32> {
    // Safari versioning is exposed in Version/x.y while Safari/x tracks WebKit build.
    if name.eq_ignore_ascii_case("safari") {
        if let Some(ver) = extract_version_after_marker(ua, "Version/") {
            return Some(ver);
        }
    }

    let marker = format!("{}/", name);
    extract_version_after_marker(ua, &marker)
}

fn extract_version_after_marker(ua: &str, marker: &str) -> Option<u32> {
    let idx = ua.find(marker)?;
    let ver_str = &ua[idx + marker.len()..];
    let token = ver_str.split_whitespace().next().unwrap_or(ver_str);
    let start = token.find(|c: char| c.is_ascii_digit())?;
    let digits = token[start..].split(|c: char| !c.is_ascii_digit()).next()?;
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}
