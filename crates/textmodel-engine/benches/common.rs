// Benchmark helper functions - Rust's dead code analysis doesn't understand
// that these are used by benchmark files in the same directory
// See: https://users.rust-lang.org/t/cargo-rustc-benches-awarnings/110111/2
#[allow(dead_code)]
pub fn generate_source_text(lines: usize) -> String {
    let base = [
        "fn example(value: usize) -> usize {",
        "    let doubled = value * 2;",
        "    // trailing comment",
        "    doubled + 1",
        "}",
        "",
    ];
    let mut content = String::new();
    for index in 0..lines {
        content.push_str(base[index % base.len()]);
        content.push('\n');
    }
    content
}

#[allow(dead_code)]
pub fn generate_mixed_width_text(lines: usize) -> String {
    let mut content = String::new();
    for index in 0..lines {
        content.push_str(&format!("línea {index} 🦀 ✓ {}\n", "ab".repeat(index % 7)));
    }
    content
}
