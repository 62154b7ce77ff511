use super::*;

#[test]
fn columns_are_aligned() {
    let csv = b"term,definition\nAPR,Annual percentage rate\nSIP,Systematic investment plan\n";
    let rendered = render_csv(csv).expect("should render csv");

    let lines: Vec<&str> = rendered.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "term  definition");
    assert_eq!(lines[1], "APR   Annual percentage rate");
    assert_eq!(lines[2], "SIP   Systematic investment plan");
}

#[test]
fn ragged_rows_are_padded() {
    let csv = b"a,b,c\n1\n2,3\n";
    let rendered = render_csv(csv).expect("should accept ragged rows");

    assert_eq!(rendered, "a  b  c\n1\n2  3");
}

#[test]
fn empty_input_renders_empty() {
    assert_eq!(render_csv(b"").expect("should render empty csv"), "");
}

#[test]
fn invalid_utf8_is_a_load_error() {
    let result = render_csv(b"name\n\xff\xfe\n");
    assert!(matches!(result, Err(RagError::Load(_))));
}
