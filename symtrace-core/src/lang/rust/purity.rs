//! Side-effect signals for Rust functions.

/// `(regex, reason)` pairs matched against function text.
pub(crate) const RAW_PATTERNS: &[(&str, &str)] = &[
    (r"\b(?:println|eprintln|print|eprint|dbg)!", "console output"),
    (r"\bstd::fs\b|\bfs::", "file system access"),
    (r"\bstd::io\b|\bio::(?:stdin|stdout|stderr)\b", "standard I/O access"),
    (r"\bstd::net\b|\b(?:TcpStream|TcpListener|UdpSocket)\b", "network access"),
    (r"\bstd::process\b|\bCommand::new\b", "process control"),
    (r"\bstd::env\b|\benv::(?:var|vars|args|set_var)\b", "environment access"),
    (r"\bunsafe\b", "unsafe code"),
    (r"\bstatic\s+mut\b", "mutable static"),
    (r"&\s*mut\s+self\b", "mutates self"),
    (r"\.lock\(\)", "acquires a lock"),
    (r"\b(?:Instant|SystemTime)::now\b", "reads the clock"),
    (r"\brand::|\bthread_rng\b", "random number generation"),
];
