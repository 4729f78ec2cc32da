//! Path globs for changed-file commands
//!
//! `*` matches within one path segment, `**` across any number of segments
//! and `?` a single non-slash character.

/// Match a path against a glob
pub fn glob_match(pattern: &str, path: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let v: Vec<char> = path.chars().collect();
    matches_from(&p, &v)
}

fn matches_from(p: &[char], v: &[char]) -> bool {
    match p.first() {
        None => v.is_empty(),
        Some('*') if p.get(1) == Some(&'*') => {
            let rest = &p[2..];
            // `**/` also matches zero directories
            if rest.first() == Some(&'/') && matches_from(&rest[1..], v) {
                return true;
            }
            (0..=v.len()).any(|i| matches_from(rest, &v[i..]))
        }
        Some('*') => {
            let rest = &p[1..];
            for i in 0..=v.len() {
                if matches_from(rest, &v[i..]) {
                    return true;
                }
                if v.get(i) == Some(&'/') {
                    break;
                }
            }
            false
        }
        Some('?') => v.first().is_some_and(|c| *c != '/') && matches_from(&p[1..], &v[1..]),
        Some(c) => v.first() == Some(c) && matches_from(&p[1..], &v[1..]),
    }
}
