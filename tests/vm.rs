#[cfg(test)]
mod vm_tests {
    use loxide as lox;

    use std::cell::RefCell;
    use std::io;
    use std::io::Write;
    use std::rc::Rc;

    use lox::chunk::{Chunk, OpCode};
    use lox::debug::disassemble_chunk;
    use lox::error::LoxError;
    use lox::reporter::Reporter;
    use lox::value::Value;
    use lox::vm::Vm;

    #[derive(Clone, Default)]
    struct SharedBuf(Rc<RefCell<Vec<u8>>>);

    impl SharedBuf {
        fn contents(&self) -> String {
            String::from_utf8(self.0.borrow().clone()).expect("output is UTF-8")
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Compiles and runs one expression, returning the result of the run,
    /// the VM's stdout, and everything written to the shared error sink
    /// (compile diagnostics and runtime messages alike).
    fn interpret(source: &str) -> (Result<(), LoxError>, String, String) {
        let out = SharedBuf::default();
        let err = SharedBuf::default();

        let mut reporter = Reporter::with_sink(Box::new(err.clone()));
        let mut vm = Vm::with_sinks(Box::new(out.clone()), Box::new(err.clone()));

        let result = vm.interpret(source, &mut reporter);

        (result, out.contents(), err.contents())
    }

    fn assert_evaluates(source: &str, expected: &str) {
        let (result, stdout, stderr) = interpret(source);

        assert!(result.is_ok(), "source: {:?}, stderr: {}", source, stderr);
        assert_eq!(stdout, format!("{}\n", expected), "source: {:?}", source);
    }

    // ─────────────────────────────────────────────────────────────────────
    // Arithmetic and literals
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn test_arithmetic_precedence() {
        assert_evaluates("1 + 2 * 3", "7");
        assert_evaluates("(1 + 2) * 3", "9");
        assert_evaluates("1 + 2 - 4", "-1");
        assert_evaluates("10 / 4", "2.5");
    }

    #[test]
    fn test_negation_and_grouping() {
        assert_evaluates("-(1 + 2)", "-3");
        assert_evaluates("--3", "3");
    }

    #[test]
    fn test_literals() {
        assert_evaluates("nil", "nil");
        assert_evaluates("true", "true");
        assert_evaluates("false", "false");
        assert_evaluates("1.25", "1.25");
    }

    #[test]
    fn test_not_uses_truthiness() {
        assert_evaluates("!nil", "true");
        assert_evaluates("!false", "true");
        assert_evaluates("!0", "false");
        assert_evaluates("!!true", "true");
    }

    // ─────────────────────────────────────────────────────────────────────
    // Comparison and the derived encodings
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn test_comparisons() {
        assert_evaluates("1 < 2", "true");
        assert_evaluates("2 > 3", "false");

        // `<=`, `>=`, and `!=` are derived: GREATER/LESS/EQUAL plus NOT.
        assert_evaluates("2 <= 2", "true");
        assert_evaluates("2 >= 3", "false");
        assert_evaluates("1 != 2", "true");
    }

    #[test]
    fn test_equality_across_kinds() {
        assert_evaluates("nil == nil", "true");
        assert_evaluates("1 == 1", "true");
        assert_evaluates("true == 1", "false");
        assert_evaluates("nil == false", "false");
    }

    #[test]
    fn test_mixed_arithmetic_comparison_and_logic() {
        assert_evaluates("!(5 - 4 > 3 * 2 == !nil)", "true");
    }

    // ─────────────────────────────────────────────────────────────────────
    // Errors
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn test_compile_error_reports_and_fails() {
        let (result, stdout, stderr) = interpret("1 + )");

        assert!(matches!(result, Err(LoxError::Parse { .. })));
        assert!(stderr.contains("Expect expression."));
        assert_eq!(stdout, "");
    }

    #[test]
    fn test_compile_error_at_end() {
        let (result, _, stderr) = interpret("(1 + 2");

        assert!(result.is_err());
        assert!(
            stderr.contains("Error at end: Expect ')' after expression."),
            "got: {}",
            stderr
        );
    }

    #[test]
    fn test_panic_mode_suppresses_cascades() {
        let (result, _, stderr) = interpret(") ) )");

        assert!(result.is_err());
        assert_eq!(
            stderr.matches("Expect expression.").count(),
            1,
            "got: {}",
            stderr
        );
    }

    #[test]
    fn test_binary_type_error() {
        let (result, _, stderr) = interpret("1 + true");

        assert!(matches!(result, Err(LoxError::Runtime { .. })));
        assert!(stderr.contains("Operands must be numbers."));
        assert!(stderr.contains("[line 1] in script"), "got: {}", stderr);
    }

    #[test]
    fn test_negate_type_error() {
        let (result, _, stderr) = interpret("-nil");

        assert!(matches!(result, Err(LoxError::Runtime { .. })));
        assert!(stderr.contains("Operand must be a number."));
    }

    #[test]
    fn test_runtime_error_line_comes_from_the_line_table() {
        let (result, _, stderr) = interpret("1 +\ntrue");

        assert!(result.is_err());
        assert!(
            stderr.contains("[line 1] in script") || stderr.contains("[line 2] in script"),
            "got: {}",
            stderr
        );
    }

    #[test]
    fn test_too_many_constants() {
        let terms: Vec<String> = (0..300).map(|i| i.to_string()).collect();
        let source = terms.join(" + ");

        let (result, _, stderr) = interpret(&source);

        assert!(result.is_err());
        assert!(stderr.contains("Too many constants in one chunk."));
    }

    #[test]
    fn test_vm_is_reusable_after_a_runtime_error() {
        let out = SharedBuf::default();
        let err = SharedBuf::default();

        let mut reporter = Reporter::with_sink(Box::new(err.clone()));
        let mut vm = Vm::with_sinks(Box::new(out.clone()), Box::new(err.clone()));

        assert!(vm.interpret("1 + nil", &mut reporter).is_err());

        // The stack was reset; the next program runs clean.
        assert!(vm.interpret("2 + 2", &mut reporter).is_ok());
        assert_eq!(out.contents(), "4\n");
    }

    // ─────────────────────────────────────────────────────────────────────
    // Chunk and disassembler
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn test_chunk_records_lines_per_byte() {
        let mut chunk = Chunk::new();

        let index = chunk.add_constant(Value::Number(1.2));
        chunk.write_op(OpCode::Constant, 123);
        chunk.write(index as u8, 123);
        chunk.write_op(OpCode::Return, 124);

        assert_eq!(chunk.len(), 3);
        assert_eq!(chunk.line_at(0), 123);
        assert_eq!(chunk.line_at(1), 123);
        assert_eq!(chunk.line_at(2), 124);
        assert_eq!(chunk.constant_count(), 1);
    }

    #[test]
    fn test_opcode_round_trip() {
        for byte in 0..=13u8 {
            let op = OpCode::from_byte(byte).expect("all 14 opcodes decode");
            assert_eq!(op as u8, byte);
        }

        assert_eq!(OpCode::from_byte(200), None);
    }

    #[test]
    fn test_disassembler_format() {
        let mut chunk = Chunk::new();

        let index = chunk.add_constant(Value::Number(1.2));
        chunk.write_op(OpCode::Constant, 1);
        chunk.write(index as u8, 1);
        chunk.write_op(OpCode::Negate, 1);
        chunk.write_op(OpCode::Return, 2);

        let listing = disassemble_chunk(&chunk, "test");

        assert!(listing.starts_with("== test =="), "got: {}", listing);
        assert!(listing.contains("OP_CONSTANT"));
        assert!(listing.contains("'1.2'"));
        assert!(listing.contains("OP_NEGATE"));
        assert!(listing.contains("OP_RETURN"));

        // Byte 2 shares line 1 with byte 0, so its line column collapses to
        // a continuation marker.
        assert!(listing.contains("|"), "got: {}", listing);
    }

    #[test]
    fn test_run_a_hand_built_chunk() {
        // 3 * 4, assembled by hand.
        let mut chunk = Chunk::new();

        let three = chunk.add_constant(Value::Number(3.0));
        let four = chunk.add_constant(Value::Number(4.0));

        chunk.write_op(OpCode::Constant, 1);
        chunk.write(three as u8, 1);
        chunk.write_op(OpCode::Constant, 1);
        chunk.write(four as u8, 1);
        chunk.write_op(OpCode::Multiply, 1);
        chunk.write_op(OpCode::Return, 1);

        let out = SharedBuf::default();
        let mut vm = Vm::with_sinks(Box::new(out.clone()), Box::new(SharedBuf::default()));

        assert!(vm.run(&chunk).is_ok());
        assert_eq!(out.contents(), "12\n");
    }
}
