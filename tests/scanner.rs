#[cfg(test)]
mod scanner_tests {
    use loxide as lox;

    use lox::error::LoxError;
    use lox::scanner::Scanner;
    use lox::token::{Token, TokenType};

    fn assert_token_sequence(source: &str, expected: &[(TokenType, &str)]) {
        let scanner = Scanner::new(source);
        let tokens: Vec<Token> = scanner.filter_map(Result::ok).collect();

        assert_eq!(
            tokens.len(),
            expected.len(),
            "token count mismatch for {:?}",
            source
        );

        for (actual, (expected_type, expected_lexeme)) in tokens.iter().zip(expected.iter()) {
            assert_eq!(actual.token_type, *expected_type);
            assert_eq!(actual.lexeme, *expected_lexeme);
        }
    }

    #[test]
    fn test_scanner_symbols() {
        assert_token_sequence(
            "({*.,+*})",
            &[
                (TokenType::LEFT_PAREN, "("),
                (TokenType::LEFT_BRACE, "{"),
                (TokenType::STAR, "*"),
                (TokenType::DOT, "."),
                (TokenType::COMMA, ","),
                (TokenType::PLUS, "+"),
                (TokenType::STAR, "*"),
                (TokenType::RIGHT_BRACE, "}"),
                (TokenType::RIGHT_PAREN, ")"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_one_or_two_char_operators() {
        assert_token_sequence(
            "! != = == < <= > >=",
            &[
                (TokenType::BANG, "!"),
                (TokenType::BANG_EQUAL, "!="),
                (TokenType::EQUAL, "="),
                (TokenType::EQUAL_EQUAL, "=="),
                (TokenType::LESS, "<"),
                (TokenType::LESS_EQUAL, "<="),
                (TokenType::GREATER, ">"),
                (TokenType::GREATER_EQUAL, ">="),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_keywords_and_identifiers() {
        assert_token_sequence(
            "class classy and android var x_1",
            &[
                (TokenType::CLASS, "class"),
                (TokenType::IDENTIFIER, "classy"),
                (TokenType::AND, "and"),
                (TokenType::IDENTIFIER, "android"),
                (TokenType::VAR, "var"),
                (TokenType::IDENTIFIER, "x_1"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_numbers() {
        let scanner = Scanner::new("123 123.456 1.");
        let tokens: Vec<Token> = scanner.filter_map(Result::ok).collect();

        // `1.` is a NUMBER then an independent DOT: the fraction needs a
        // digit after the point.
        assert_eq!(tokens.len(), 5);

        assert_eq!(tokens[0].token_type, TokenType::NUMBER(0.0));
        assert_eq!(tokens[0].lexeme, "123");

        assert_eq!(tokens[1].lexeme, "123.456");

        assert_eq!(tokens[2].lexeme, "1");
        assert_eq!(tokens[3].token_type, TokenType::DOT);
        assert_eq!(tokens[4].token_type, TokenType::EOF);

        if let TokenType::NUMBER(n) = tokens[1].token_type {
            assert_eq!(n, 123.456);
        } else {
            panic!("expected NUMBER token");
        }
    }

    #[test]
    fn test_string_literal_strips_quotes() {
        let scanner = Scanner::new("\"hello world\"");
        let tokens: Vec<Token> = scanner.filter_map(Result::ok).collect();

        assert_eq!(tokens.len(), 2);

        match &tokens[0].token_type {
            TokenType::STRING(literal) => assert_eq!(literal, "hello world"),
            other => panic!("expected STRING token, got {:?}", other),
        }

        // The lexeme keeps the surrounding quotes.
        assert_eq!(tokens[0].lexeme, "\"hello world\"");
    }

    #[test]
    fn test_multiline_string_counts_lines() {
        let scanner = Scanner::new("\"a\nb\"\nident");
        let tokens: Vec<Token> = scanner.filter_map(Result::ok).collect();

        assert_eq!(tokens.len(), 3);

        // The string closes on line 2, and the identifier sits on line 3.
        assert_eq!(tokens[0].line, 2);
        assert_eq!(tokens[1].line, 3);
        assert_eq!(tokens[1].token_type, TokenType::IDENTIFIER);
    }

    #[test]
    fn test_comments_and_whitespace_are_skipped() {
        assert_token_sequence(
            "var x // the rest is ignored ({\n;",
            &[
                (TokenType::VAR, "var"),
                (TokenType::IDENTIFIER, "x"),
                (TokenType::SEMICOLON, ";"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_unterminated_string_is_an_error() {
        let scanner = Scanner::new("\"no closing quote");
        let results: Vec<_> = scanner.collect();

        let errors: Vec<&LoxError> = results.iter().filter_map(|r| r.as_ref().err()).collect();

        assert_eq!(errors.len(), 1);

        match errors[0] {
            LoxError::Lex { message, line } => {
                assert_eq!(message, "Unterminated string.");
                assert_eq!(*line, 1);
            }
            other => panic!("expected Lex error, got {:?}", other),
        }
    }

    #[test]
    fn test_unexpected_chars_interleave_with_tokens() {
        let scanner = Scanner::new(",.$(#");
        let results: Vec<_> = scanner.collect();

        // COMMA, DOT, error for '$', LEFT_PAREN, error for '#', EOF.
        assert_eq!(results.len(), 6);

        assert!(results[0].is_ok());
        assert!(results[1].is_ok());
        assert!(results[2].is_err());
        assert!(results[3].is_ok());
        assert!(results[4].is_err());

        for err in results.iter().filter_map(|r| r.as_ref().err()) {
            match err {
                LoxError::Lex { message, .. } => assert_eq!(message, "Unexpected character."),
                other => panic!("expected Lex error, got {:?}", other),
            }
        }

        match results[5].as_ref() {
            Ok(token) => assert_eq!(token.token_type, TokenType::EOF),
            Err(e) => panic!("expected EOF token, got error {:?}", e),
        }
    }

    #[test]
    fn test_multibyte_rune_is_one_error() {
        // A multi-byte character must produce one diagnostic, not one per
        // byte, and scanning must pick up cleanly after it.
        let scanner = Scanner::new("1 é 2");
        let results: Vec<_> = scanner.collect();

        let errors = results.iter().filter(|r| r.is_err()).count();
        let tokens: Vec<Token> = results.into_iter().filter_map(Result::ok).collect();

        assert_eq!(errors, 1);
        assert_eq!(tokens.len(), 3); // 1, 2, EOF
        assert_eq!(tokens[1].lexeme, "2");
    }

    #[test]
    fn test_every_scan_ends_with_exactly_one_eof() {
        let sources = [
            "",
            "   \t\r\n",
            "// only a comment",
            "var x = 1;",
            "\"unterminated",
            "$$$",
            "fun f(a, b) { return a + b; }",
        ];

        for source in sources {
            let tokens: Vec<Token> = Scanner::new(source).filter_map(Result::ok).collect();

            let eof_count = tokens.iter().filter(|t| t.is_eof()).count();

            assert_eq!(eof_count, 1, "source {:?}", source);

            assert_eq!(
                tokens.last().map(|t| t.is_eof()),
                Some(true),
                "EOF must come last for {:?}",
                source
            );
        }
    }

    #[test]
    fn test_lines_start_at_one() {
        let tokens: Vec<Token> = Scanner::new("a\nb\nc")
            .filter_map(Result::ok)
            .collect();

        assert!(tokens.iter().all(|t| t.line >= 1));
        assert_eq!(tokens[0].line, 1);
        assert_eq!(tokens[1].line, 2);
        assert_eq!(tokens[2].line, 3);
    }
}
