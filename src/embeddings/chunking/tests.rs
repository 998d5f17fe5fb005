use super::*;

const SAMPLE_SOURCE: &str = "fn main() {\n    let greeting = \"hello\";\n    println!(\"{greeting}\");\n}\n";

#[test]
fn round_trip_is_lossless() {
    let inputs = [
        "single line",
        SAMPLE_SOURCE,
        "trailing newline\n",
        "a\n\nb\n\n\nc",
        "\n",
        "    indented\n\tand tabbed\n",
    ];

    for input in inputs {
        for budget in [1, 5, 80, 6000] {
            let chunks = split_into_chunks(input, budget);
            assert_eq!(
                chunks.join("\n"),
                input,
                "input {:?} with budget {} did not survive the round trip",
                input,
                budget
            );
        }
    }
}

#[test]
fn empty_input_yields_no_chunks() {
    assert!(split_into_chunks("", 100).is_empty());
}

#[test]
fn non_empty_input_yields_at_least_one_chunk() {
    // A single line far over the budget must still come back whole.
    let long_line = "x".repeat(400);
    let chunks = split_into_chunks(&long_line, 1);
    assert_eq!(chunks, vec![long_line]);
}

#[test]
fn lines_are_never_split() {
    let input = "alpha beta gamma\ndelta epsilon\nzeta";
    let chunks = split_into_chunks(input, 2);

    let original_lines: Vec<&str> = input.split('\n').collect();
    let mut cursor = 0;
    for chunk in &chunks {
        for line in chunk.split('\n') {
            assert_eq!(line, original_lines[cursor]);
            cursor += 1;
        }
    }
    assert_eq!(cursor, original_lines.len());
}

#[test]
fn budget_bounds_chunk_size() {
    // Eight-character lines estimate to 2 tokens each; a budget of 4 fits
    // exactly two lines per chunk.
    let input = vec!["abcdefgh"; 6].join("\n");
    let chunks = split_into_chunks(&input, 4);

    assert_eq!(chunks.len(), 3);
    for chunk in &chunks {
        assert_eq!(chunk.split('\n').count(), 2);
    }
}

#[test]
fn order_is_preserved() {
    let input = (0..50).map(|i| format!("line number {i}")).collect::<Vec<_>>().join("\n");
    let chunks = split_into_chunks(&input, 8);

    assert!(chunks.len() > 1);
    assert_eq!(chunks.join("\n"), input);
}

#[test]
fn token_estimate_uses_fixed_ratio() {
    assert_eq!(estimate_token_count(""), 0);
    assert_eq!(estimate_token_count("abc"), 0);
    assert_eq!(estimate_token_count("abcdefgh"), 2);
    assert_eq!(estimate_token_count(&"y".repeat(6000 * 4)), 6000);
}
