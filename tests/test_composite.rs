use forge::compiler::compile;

fn bytes(source: &str) -> Vec<u8> {
    compile(source).unwrap().code
}

#[test]
fn test_rot() {
    assert_eq!(bytes("ROT"), vec![0x05, 0x03, 0x06, 0x03, 0x51]);
}

#[test]
fn test_nip() {
    assert_eq!(bytes("NIP"), vec![0x03, 0x02, 0x51]);
}

#[test]
fn test_tuck() {
    assert_eq!(bytes("TUCK"), vec![0x03, 0x04, 0x51]);
}

#[test]
fn test_negate() {
    assert_eq!(bytes("NEGATE"), vec![0x08, 0x03, 0x11, 0x51]);
}

#[test]
fn test_question_dup() {
    // The embedded JZ +1 skips the second DUP when the value is zero.
    assert_eq!(bytes("?DUP"), vec![0x01, 0x01, 0x41, 0x01, 0x00, 0x01, 0x51]);
}

#[test]
fn test_abs() {
    // DUP 0< then conditionally the NEGATE sequence.
    assert_eq!(
        bytes("ABS"),
        vec![0x01, 0x08, 0x22, 0x41, 0x03, 0x00, 0x08, 0x03, 0x11, 0x51]
    );
}

#[test]
fn test_min() {
    assert_eq!(
        bytes("MIN"),
        vec![0x04, 0x04, 0x22, 0x41, 0x04, 0x00, 0x02, 0x40, 0x02, 0x00, 0x03, 0x02, 0x51]
    );
}

#[test]
fn test_max() {
    // Same shape as MIN with GT instead of LT.
    assert_eq!(
        bytes("MAX"),
        vec![0x04, 0x04, 0x24, 0x41, 0x04, 0x00, 0x02, 0x40, 0x02, 0x00, 0x03, 0x02, 0x51]
    );
}

#[test]
fn test_zero_comparisons() {
    assert_eq!(bytes("0="), vec![0x08, 0x20, 0x51]);
    assert_eq!(bytes("0<"), vec![0x08, 0x22, 0x51]);
    assert_eq!(bytes("0>"), vec![0x08, 0x24, 0x51]);
}

#[test]
fn test_pair_stack_ops() {
    assert_eq!(bytes("2DUP"), vec![0x04, 0x04, 0x51]);
    assert_eq!(bytes("2DROP"), vec![0x02, 0x02, 0x51]);
}

#[test]
fn test_2swap() {
    // ROT >R ROT R> with ROT expanded inline.
    assert_eq!(
        bytes("2SWAP"),
        vec![0x05, 0x03, 0x06, 0x03, 0x05, 0x05, 0x03, 0x06, 0x03, 0x06, 0x51]
    );
}

#[test]
fn test_2over() {
    assert_eq!(
        bytes("2OVER"),
        vec![
            0x05, 0x05, // >R >R
            0x04, 0x04, // OVER OVER
            0x06, 0x06, // R> R>
            0x05, 0x03, 0x06, 0x03, // ROT
            0x05, // >R
            0x05, 0x03, 0x06, 0x03, // ROT
            0x06, // R>
            0x51, // RET
        ]
    );
}

#[test]
fn test_plus_store() {
    assert_eq!(bytes("+!"), vec![0x01, 0x05, 0x70, 0x10, 0x06, 0x71, 0x51]);
}

#[test]
fn test_true_false_use_short_literals() {
    assert_eq!(bytes("TRUE"), vec![0x09, 0x51]);
    assert_eq!(bytes("FALSE"), vec![0x08, 0x51]);
}

#[test]
fn test_composites_are_case_insensitive() {
    assert_eq!(bytes("?dup"), bytes("?DUP"));
    assert_eq!(bytes("negate"), bytes("NEGATE"));
    assert_eq!(bytes("2swap"), bytes("2SWAP"));
    assert_eq!(bytes("true"), bytes("TRUE"));
}

#[test]
fn test_plain_literal_zero_is_not_short_form() {
    // Only TRUE/FALSE and the composite expansions use the short-form
    // literal opcodes; a written literal always emits LIT imm32.
    assert_eq!(bytes("0"), vec![0x00, 0x00, 0x00, 0x00, 0x00, 0x51]);
    assert_eq!(bytes("-1"), vec![0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0x51]);
}

#[test]
fn test_composites_expand_inside_words() {
    let output = compile(": CLAMP0 DUP 0< IF DROP FALSE THEN ;").unwrap();
    assert_eq!(
        output.words[0].code,
        vec![
            0x01, // DUP
            0x08, 0x22, // LIT0 LT
            0x41, 0x02, 0x00, // JZ -> THEN
            0x02, // DROP
            0x08, // LIT0 (FALSE)
            0x51, // RET
        ]
    );
}
