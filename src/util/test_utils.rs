use crate::{ir, lexer, parser, tac, util::tree};

/// Each variant contains the input.
pub enum Test {
    Parser(&'static str),
    Tac(&'static str),
}

pub enum Assertion {
    TreeOk(&'static str),
    TacOk(&'static str),
    ExpectedError(&'static str),
}

/// Runs the pipeline up to the tested stage, returning its formatted output
/// or the formatted error of the first stage that failed.
#[track_caller]
pub fn run_pipeline(test: Test) -> Result<String, String> {
    let (Test::Parser(input) | Test::Tac(input)) = test;
    let tokens = lexer::tokenize(input).map_err(|e| e.to_string())?;
    let program = parser::parse(&tokens).map_err(|e| e.to_string())?;

    match test {
        Test::Parser(_) => Ok(tree::print_program_string(&program)),
        Test::Tac(_) => Ok(ir::listing(&tac::generate(&program)).join("\n")),
    }
}

#[track_caller]
pub fn run_assertion(assertion: Assertion, actual: &Result<String, String>) {
    match (assertion, actual) {
        (Assertion::TreeOk(expected) | Assertion::TacOk(expected), Ok(actual)) => {
            ::pretty_assertions::assert_eq!(actual.trim(), expected.trim());
        }
        (Assertion::ExpectedError(expected), Err(actual)) => {
            ::pretty_assertions::assert_eq!(actual, expected);
        }
        (Assertion::TreeOk(_) | Assertion::TacOk(_), Err(error)) => {
            panic!("expected success, got error: {error}");
        }
        (Assertion::ExpectedError(expected), Ok(output)) => {
            panic!("expected error `{expected}`, got output:\n{output}");
        }
    }
}

macro_rules! tree_tests {
    (
        use $test_kind:ident;

        $(
            fn $test_name:ident() {
                let program = $source:expr;
                $($assertions_tt:tt)*
            }
        )*
    ) => {
        $(
            #[test]
            fn $test_name() {
                let test: crate::util::test_utils::Test =
                    tree_tests!(@@get_test($test_kind), $source);
                let actual = crate::util::test_utils::run_pipeline(test);
                tree_tests!(@@expand_assertions, &actual, [$($assertions_tt)*]);
            }
        )*
    };

    (@@expand_assertions, $actual:expr, []) => {};
    (@@expand_assertions, $actual:expr, [
        let $assertion:ident = $assertion_expected:expr;
        $($rest_assertions_tt:tt)*
    ]) => {
        crate::util::test_utils::run_assertion(
            tree_tests!(@@assertion, $assertion, $assertion_expected),
            $actual,
        );
        tree_tests!(@@expand_assertions, $actual, [$($rest_assertions_tt)*]);
    };

    (@@assertion, tree_ok, $expected:expr) => {
        crate::util::test_utils::Assertion::TreeOk(::indoc::indoc! { $expected })
    };
    (@@assertion, tac_ok, $expected:expr) => {
        crate::util::test_utils::Assertion::TacOk(::indoc::indoc! { $expected })
    };
    (@@assertion, expected_error, $expected:expr) => {
        crate::util::test_utils::Assertion::ExpectedError($expected)
    };

    (@@get_test(parser), $source:expr) => {
        crate::util::test_utils::Test::Parser($source)
    };
    (@@get_test(tac), $source:expr) => {
        crate::util::test_utils::Test::Tac($source)
    };
}
pub(crate) use tree_tests;
