//! Benchmarks for the JavaScript minifier.
//!
//! Run with: cargo bench --bench minify

use divan::{Bencher, black_box};
use pageopt_core::minify::{minified_size, minify};

fn main() {
    divan::main();
}

fn small_function() -> &'static str {
    "function greet ( name ) {\n    // say hello\n    return 'hi ' + name;\n}\n"
}

fn jquery_style_snippet() -> String {
    let mut src = String::new();
    for i in 0..200 {
        src.push_str(&format!(
            "function handler{i}(event) {{\n    // handle event {i}\n    if (event.type === 'click') {{\n        return /click-\\d+/g.test(event.name);\n    }}\n    var x = event.value;\n    return x + 1;\n}}\n\n",
        ));
    }
    src
}

#[divan::bench]
fn minify_small_function(bencher: Bencher) {
    let src = small_function().as_bytes();
    bencher.bench(|| minify(black_box(src)).unwrap());
}

#[divan::bench]
fn minify_large_snippet(bencher: Bencher) {
    let src = jquery_style_snippet();
    let bytes = src.as_bytes();
    bencher.bench(|| minify(black_box(bytes)).unwrap());
}

#[divan::bench]
fn minified_size_large_snippet(bencher: Bencher) {
    let src = jquery_style_snippet();
    let bytes = src.as_bytes();
    bencher.bench(|| minified_size(black_box(bytes)).unwrap());
}
