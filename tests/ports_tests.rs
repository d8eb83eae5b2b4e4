use port_checker::ports::{parse_port_span, PortSpan};

#[test]
fn parse_single_and_range() {
    assert_eq!(parse_port_span("22").expect("parse ok"), PortSpan::single(22));

    let span = parse_port_span("  0-99 ").expect("parse ok");
    assert_eq!(span, PortSpan { start: 0, end: 99 });
    assert_eq!(span.len(), 100);
}

#[test]
fn non_numeric_rejected() {
    assert!(parse_port_span("ssh").is_err());
    assert!(parse_port_span("80,443").is_err());
}
