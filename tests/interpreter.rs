#[cfg(test)]
mod interpreter_tests {
    use loxide as lox;

    use std::cell::RefCell;
    use std::io;
    use std::io::Write;
    use std::rc::Rc;

    use lox::lox::{Lox, Outcome};

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

    fn run(source: &str) -> (Outcome, String, String) {
        let out = SharedBuf::default();
        let err = SharedBuf::default();

        let mut lox = Lox::with_sinks(Box::new(out.clone()), Box::new(err.clone()));
        let outcome = lox.run(source);

        (outcome, out.contents(), err.contents())
    }

    /// Asserts a program succeeds and prints exactly `expected`.
    fn assert_prints(source: &str, expected: &str) {
        let (outcome, stdout, stderr) = run(source);

        assert_eq!(
            outcome,
            Outcome::Success,
            "source: {:?}, stderr: {}",
            source,
            stderr
        );
        assert_eq!(stdout, expected, "source: {:?}", source);
    }

    /// Asserts a program fails at runtime with `message` on `line`.
    fn assert_runtime_error(source: &str, message: &str, line: usize) {
        let (outcome, _, stderr) = run(source);

        assert_eq!(outcome, Outcome::RuntimeError, "source: {:?}", source);
        assert!(
            stderr.contains(message),
            "expected {:?} in stderr, got: {}",
            message,
            stderr
        );
        assert!(
            stderr.contains(&format!("[line {}]", line)),
            "expected line {} in stderr, got: {}",
            line,
            stderr
        );
    }

    // ─────────────────────────────────────────────────────────────────────
    // Arithmetic, printing, and value formatting
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn test_print_addition() {
        assert_prints("print 1 + 2;", "3\n");
    }

    #[test]
    fn test_precedence_round_trip() {
        assert_prints("print 1 + 2 * 3;", "7\n");
        assert_prints("print (1 + 2) * 3;", "9\n");
    }

    #[test]
    fn test_number_formatting() {
        assert_prints("print 123;", "123\n");
        assert_prints("print 123.456;", "123.456\n");
        assert_prints("print 0.5 + 0.25;", "0.75\n");
        assert_prints("print -0.0 - 1;", "-1\n");
    }

    #[test]
    fn test_string_round_trip_without_quotes() {
        assert_prints("print \"abc\";", "abc\n");
        assert_prints("print \"a\" + \"bc\";", "abc\n");
    }

    #[test]
    fn test_value_printing() {
        assert_prints("print nil;", "nil\n");
        assert_prints("print true;", "true\n");
        assert_prints("print false;", "false\n");
        assert_prints("fun f() {} print f;", "<fn f>\n");
        assert_prints("print clock;", "<native fn>\n");
        assert_prints("class C {} print C;", "C\n");
        assert_prints("class C {} print C();", "C instance\n");
    }

    #[test]
    fn test_division_by_zero_is_ieee() {
        // No runtime error: 1/0 is an infinity, and comparisons against it
        // behave normally.
        assert_prints("print 1 / 0 > 1000000;", "true\n");
    }

    // ─────────────────────────────────────────────────────────────────────
    // Truthiness, equality, and logical operators
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn test_truthiness() {
        assert_prints("print !nil;", "true\n");
        assert_prints("print !false;", "true\n");
        assert_prints("print !0;", "false\n");
        assert_prints("print !\"\";", "false\n");
        assert_prints("print !true;", "false\n");
    }

    #[test]
    fn test_equality() {
        assert_prints("print nil == nil;", "true\n");
        assert_prints("print 1 == 1;", "true\n");
        assert_prints("print 1 == 2;", "false\n");
        assert_prints("print \"a\" == \"a\";", "true\n");
        assert_prints("print 1 == \"1\";", "false\n");
        assert_prints("print nil == false;", "false\n");
        assert_prints("print 1 != 2;", "true\n");
    }

    #[test]
    fn test_logical_operators_return_operands() {
        assert_prints("print \"hi\" or 2;", "hi\n");
        assert_prints("print nil or \"yes\";", "yes\n");
        assert_prints("print nil and 2;", "nil\n");
        assert_prints("print 1 and 2;", "2\n");
    }

    #[test]
    fn test_logical_operators_short_circuit() {
        // The right side must not evaluate when the left decides.
        assert_prints(
            "fun boom() { print \"boom\"; return true; } print false and boom();",
            "false\n",
        );
        assert_prints(
            "fun boom() { print \"boom\"; return true; } print true or boom();",
            "true\n",
        );
    }

    // ─────────────────────────────────────────────────────────────────────
    // Variables, scoping, and control flow
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn test_block_scoping_and_shadowing() {
        assert_prints(
            "var a = 1; { var a = 2; print a; } print a;",
            "2\n1\n",
        );
    }

    #[test]
    fn test_assignment_is_an_expression() {
        assert_prints("var a = 1; print a = 2;", "2\n");
    }

    #[test]
    fn test_uninitialized_variable_is_nil() {
        assert_prints("var a; print a;", "nil\n");
    }

    #[test]
    fn test_if_else() {
        assert_prints("if (1 < 2) print \"yes\"; else print \"no\";", "yes\n");
        assert_prints("if (nil) print \"yes\"; else print \"no\";", "no\n");
    }

    #[test]
    fn test_while_loop() {
        assert_prints(
            "var i = 0; while (i < 3) { print i; i = i + 1; }",
            "0\n1\n2\n",
        );
    }

    #[test]
    fn test_for_loop() {
        assert_prints("for (var i = 0; i < 3; i = i + 1) print i;", "0\n1\n2\n");
    }

    #[test]
    fn test_for_loop_with_existing_variable() {
        assert_prints(
            "var i; for (i = 0; i < 2; i = i + 1) {} print i;",
            "2\n",
        );
    }

    // ─────────────────────────────────────────────────────────────────────
    // Functions, returns, and closures
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn test_fibonacci() {
        assert_prints(
            "fun fib(n) { if (n < 2) return n; return fib(n - 1) + fib(n - 2); } print fib(10);",
            "55\n",
        );
    }

    #[test]
    fn test_function_without_return_yields_nil() {
        assert_prints("fun f() {} print f();", "nil\n");
    }

    #[test]
    fn test_return_unwinds_through_loops() {
        assert_prints(
            "fun first() { for (var i = 0; i < 10; i = i + 1) { if (i == 3) return i; } } print first();",
            "3\n",
        );
    }

    #[test]
    fn test_closures_capture_independently() {
        let source = r#"
            fun make() {
              var i = 0;
              fun inc() { i = i + 1; return i; }
              return inc;
            }
            var a = make();
            var b = make();
            print a();
            print a();
            print a();
            print b();
        "#;

        assert_prints(source, "1\n2\n3\n1\n");
    }

    #[test]
    fn test_closure_keeps_environment_alive() {
        let source = r#"
            var f;
            {
              var local = "kept";
              fun inner() { print local; }
              f = inner;
            }
            f();
        "#;

        assert_prints(source, "kept\n");
    }

    #[test]
    fn test_arguments_evaluate_left_to_right() {
        let source = r#"
            fun side(label) { print label; return label; }
            fun take(a, b) {}
            take(side("first"), side("second"));
        "#;

        assert_prints(source, "first\nsecond\n");
    }

    #[test]
    fn test_clock_is_a_number() {
        assert_prints("print clock() >= 0;", "true\n");
    }

    // ─────────────────────────────────────────────────────────────────────
    // Classes, instances, and inheritance
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn test_fields_and_methods() {
        let source = r#"
            class Cake {
              taste() { print "The " + this.flavor; }
            }
            var cake = Cake();
            cake.flavor = "chocolate";
            cake.taste();
        "#;

        assert_prints(source, "The chocolate\n");
    }

    #[test]
    fn test_initializer_runs_on_construction() {
        let source = r#"
            class Point {
              init(x, y) { this.x = x; this.y = y; }
            }
            var p = Point(3, 4);
            print p.x + p.y;
        "#;

        assert_prints(source, "7\n");
    }

    #[test]
    fn test_initializer_returns_the_instance() {
        let source = r#"
            class C {
              init() { this.tag = "made"; }
            }
            var c = C();
            print c.init().tag;
        "#;

        assert_prints(source, "made\n");
    }

    #[test]
    fn test_bound_method_remembers_its_instance() {
        let source = r#"
            class Person {
              greet() { print this.name; }
            }
            var p = Person();
            p.name = "Ann";
            var m = p.greet;
            m();
        "#;

        assert_prints(source, "Ann\n");
    }

    #[test]
    fn test_fields_shadow_methods() {
        let source = r#"
            class C {
              hello() { print "method"; }
            }
            var c = C();
            c.hello = 42;
            print c.hello;
        "#;

        assert_prints(source, "42\n");
    }

    #[test]
    fn test_inheritance_and_super() {
        let source = r#"
            class A { greet() { print "hi"; } }
            class B < A { greet() { super.greet(); print "bye"; } }
            B().greet();
        "#;

        assert_prints(source, "hi\nbye\n");
    }

    #[test]
    fn test_inherited_method_without_override() {
        let source = r#"
            class A { f() { print "from A"; } }
            class B < A {}
            B().f();
        "#;

        assert_prints(source, "from A\n");
    }

    #[test]
    fn test_super_skips_own_override_deeper_down() {
        let source = r#"
            class A { method() { print "A method"; } }
            class B < A {
              method() { print "B method"; }
              test() { super.method(); }
            }
            class C < B {}
            C().test();
        "#;

        assert_prints(source, "A method\n");
    }

    #[test]
    fn test_later_method_declaration_wins() {
        let source = r#"
            class C {
              f() { print "first"; }
              f() { print "second"; }
            }
            C().f();
        "#;

        assert_prints(source, "second\n");
    }

    // ─────────────────────────────────────────────────────────────────────
    // Runtime errors
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn test_adding_string_and_number_fails() {
        assert_runtime_error(
            "print \"a\" + 1;",
            "Operands must be two numbers or two strings.",
            1,
        );
    }

    #[test]
    fn test_arithmetic_requires_numbers() {
        assert_runtime_error("print true * 2;", "Operands must be numbers.", 1);
        assert_runtime_error("print nil < 1;", "Operands must be numbers.", 1);
    }

    #[test]
    fn test_unary_minus_requires_number() {
        assert_runtime_error("print -\"abc\";", "Operand must be a number.", 1);
    }

    #[test]
    fn test_undefined_variable() {
        assert_runtime_error("print missing;", "Undefined variable 'missing'.", 1);
        assert_runtime_error("missing = 1;", "Undefined variable 'missing'.", 1);
    }

    #[test]
    fn test_calling_a_non_callable() {
        assert_runtime_error("\"str\"();", "Can only call functions and classes.", 1);
    }

    #[test]
    fn test_arity_mismatch() {
        assert_runtime_error(
            "fun f(a, b) {}\nf(1);",
            "Expected 2 arguments but got 1.",
            2,
        );
    }

    #[test]
    fn test_property_access_on_non_instance() {
        assert_runtime_error("var x = 1;\nx.field;", "Only instances have properties.", 2);
        assert_runtime_error("var x = 1;\nx.field = 2;", "Only instances have fields.", 2);
    }

    #[test]
    fn test_undefined_property() {
        assert_runtime_error(
            "class C {}\nC().missing;",
            "Undefined property 'missing'.",
            2,
        );
    }

    #[test]
    fn test_undefined_super_method() {
        assert_runtime_error(
            "class A {}\nclass B < A { f() { super.missing(); } }\nB().f();",
            "Undefined property 'missing'.",
            2,
        );
    }

    #[test]
    fn test_superclass_must_be_a_class() {
        assert_runtime_error(
            "var NotAClass = 1;\nclass C < NotAClass {}",
            "Superclass must be a class.",
            2,
        );
    }

    #[test]
    fn test_runtime_error_stops_the_batch() {
        let (outcome, stdout, stderr) = run("print 1;\nprint missing;\nprint 2;");

        assert_eq!(outcome, Outcome::RuntimeError);
        assert_eq!(stdout, "1\n", "nothing may run past the failure");
        assert!(stderr.contains("Undefined variable 'missing'."));
    }

    #[test]
    fn test_repl_lines_do_not_alias_resolution_entries() {
        let out = SharedBuf::default();
        let err = SharedBuf::default();

        let mut lox = Lox::with_sinks(Box::new(out.clone()), Box::new(err.clone()));

        assert_eq!(lox.run("{ var a = 1; print a; }"), Outcome::Success);
        lox.reset();

        // Without session-unique expression ids this read would alias the
        // previous line's resolved local slot instead of falling through to
        // the globals.
        assert_eq!(lox.run("print b;"), Outcome::RuntimeError);

        assert_eq!(out.contents(), "1\n");
        assert!(err.contents().contains("Undefined variable 'b'."));
    }

    #[test]
    fn test_repl_lines_share_globals() {
        let out = SharedBuf::default();
        let err = SharedBuf::default();

        let mut lox = Lox::with_sinks(Box::new(out.clone()), Box::new(err.clone()));

        assert_eq!(lox.run("fun twice(n) { return n * 2; }"), Outcome::Success);
        assert_eq!(lox.run("print twice(21);"), Outcome::Success);
        assert_eq!(out.contents(), "42\n");
    }

    #[test]
    fn test_environment_restored_after_failed_block() {
        // The failure unwinds out of the block; a follow-up line against the
        // same driver (as in the REPL) still sees the outer scope intact.
        let out = SharedBuf::default();
        let err = SharedBuf::default();

        let mut lox = Lox::with_sinks(Box::new(out.clone()), Box::new(err.clone()));

        assert_eq!(
            lox.run("var a = \"outer\"; { var a = \"inner\"; missing; }"),
            Outcome::RuntimeError
        );

        lox.reset();

        assert_eq!(lox.run("print a;"), Outcome::Success);
        assert_eq!(out.contents(), "outer\n");
    }
}
