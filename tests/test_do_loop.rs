use forge::compiler::{compile, MAX_LEAVE_DEPTH};
use forge::error::ErrorKind;

fn bytes(source: &str) -> Vec<u8> {
    compile(source).unwrap().code
}

fn kind(source: &str) -> ErrorKind {
    compile(source).unwrap_err().kind()
}

#[test]
fn test_do_loop_sequence() {
    // DO moves ( limit index ) to the return stack; LOOP increments the
    // index by one, compares against the limit, and jumps back while
    // index < limit.
    assert_eq!(
        bytes("10 0 DO LOOP"),
        vec![
            0x00, 0x0A, 0x00, 0x00, 0x00, // LIT 10
            0x00, 0x00, 0x00, 0x00, 0x00, // LIT 0
            0x03, 0x05, 0x05, // SWAP TOR TOR
            0x06, // FROMR (index)
            0x00, 0x01, 0x00, 0x00, 0x00, // LIT 1
            0x10, // ADD
            0x06, // FROMR (limit)
            0x04, 0x04, // OVER OVER
            0x22, // LT
            0x41, 0x06, 0x00, // JZ -> exit (the DROPs)
            0x03, // SWAP
            0x05, 0x05, // TOR TOR
            0x40, 0xEC, 0xFF, // JMP -> loop body start
            0x02, 0x02, // DROP DROP
            0x51, // RET
        ]
    );
}

#[test]
fn test_plus_loop_takes_increment_from_stack() {
    assert_eq!(
        bytes("10 0 DO 2 +LOOP"),
        vec![
            0x00, 0x0A, 0x00, 0x00, 0x00, // LIT 10
            0x00, 0x00, 0x00, 0x00, 0x00, // LIT 0
            0x03, 0x05, 0x05, // SWAP TOR TOR
            0x00, 0x02, 0x00, 0x00, 0x00, // LIT 2 (the increment)
            0x06, // FROMR (index)
            0x10, // ADD
            0x06, // FROMR (limit)
            0x04, 0x04, // OVER OVER
            0x22, // LT
            0x41, 0x06, 0x00, // JZ -> exit
            0x03, // SWAP
            0x05, 0x05, // TOR TOR
            0x40, 0xEC, 0xFF, // JMP -> loop body start
            0x02, 0x02, // DROP DROP
            0x51, // RET
        ]
    );
}

#[test]
fn test_loop_index_via_i() {
    assert_eq!(
        bytes("10 0 DO I LOOP"),
        vec![
            0x00, 0x0A, 0x00, 0x00, 0x00, // LIT 10
            0x00, 0x00, 0x00, 0x00, 0x00, // LIT 0
            0x03, 0x05, 0x05, // SWAP TOR TOR
            0x07, // RFETCH (I)
            0x06, // FROMR
            0x00, 0x01, 0x00, 0x00, 0x00, // LIT 1
            0x10, // ADD
            0x06, // FROMR
            0x04, 0x04, // OVER OVER
            0x22, // LT
            0x41, 0x06, 0x00, // JZ -> exit
            0x03, // SWAP
            0x05, 0x05, // TOR TOR
            0x40, 0xEB, 0xFF, // JMP -> loop body start
            0x02, 0x02, // DROP DROP
            0x51, // RET
        ]
    );
}

#[test]
fn test_leave_jumps_past_loop_cleanup() {
    // LEAVE unwinds the return stack itself, so its JMP lands after the
    // LOOP tail's DROP DROP.
    assert_eq!(
        bytes("10 0 DO LEAVE LOOP"),
        vec![
            0x00, 0x0A, 0x00, 0x00, 0x00, // LIT 10
            0x00, 0x00, 0x00, 0x00, 0x00, // LIT 0
            0x03, 0x05, 0x05, // SWAP TOR TOR
            0x06, 0x06, // FROMR FROMR
            0x02, 0x02, // DROP DROP
            0x40, 0x16, 0x00, // JMP -> past the loop
            0x06, // FROMR
            0x00, 0x01, 0x00, 0x00, 0x00, // LIT 1
            0x10, // ADD
            0x06, // FROMR
            0x04, 0x04, // OVER OVER
            0x22, // LT
            0x41, 0x06, 0x00, // JZ -> exit
            0x03, // SWAP
            0x05, 0x05, // TOR TOR
            0x40, 0xE5, 0xFF, // JMP -> loop body start
            0x02, 0x02, // DROP DROP
            0x51, // RET
        ]
    );
}

#[test]
fn test_leave_inside_if_finds_enclosing_do() {
    // The IF frame sits on top of the DO frame; LEAVE scans down to the
    // innermost DO.
    assert!(compile("10 0 DO I 5 = IF LEAVE THEN LOOP").is_ok());
}

#[test]
fn test_j_copies_outer_loop_index() {
    assert_eq!(bytes("J"), vec![0x06, 0x06, 0x06, 0x01, 0x05, 0x05, 0x05, 0x51]);
}

#[test]
fn test_k_copies_outer_outer_loop_index() {
    assert_eq!(
        bytes("K"),
        vec![0x06, 0x06, 0x06, 0x06, 0x06, 0x01, 0x05, 0x05, 0x05, 0x05, 0x05, 0x51]
    );
}

#[test]
fn test_nested_do_loops() {
    assert!(compile("3 0 DO 3 0 DO J I + LOOP LOOP").is_ok());
}

#[test]
fn test_leave_at_max_depth_succeeds() {
    let mut source = String::from("10 0 DO ");
    for _ in 0..MAX_LEAVE_DEPTH {
        source.push_str("LEAVE ");
    }
    source.push_str("LOOP");
    assert!(compile(&source).is_ok());
}

#[test]
fn test_leave_past_max_depth_fails() {
    let mut source = String::from("10 0 DO ");
    for _ in 0..=MAX_LEAVE_DEPTH {
        source.push_str("LEAVE ");
    }
    source.push_str("LOOP");
    assert_eq!(kind(&source), ErrorKind::LeaveDepthExceeded);
}

#[test]
fn test_do_family_errors() {
    assert_eq!(kind("LOOP"), ErrorKind::LoopWithoutDo);
    assert_eq!(kind("+LOOP"), ErrorKind::PLoopWithoutDo);
    assert_eq!(kind("BEGIN LOOP"), ErrorKind::LoopWithoutDo);
    assert_eq!(kind("LEAVE"), ErrorKind::LeaveWithoutDo);
    assert_eq!(kind("BEGIN LEAVE AGAIN"), ErrorKind::LeaveWithoutDo);
    assert_eq!(kind("1 0 DO"), ErrorKind::UnclosedDo);
}
