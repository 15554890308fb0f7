//! Shared test utilities for hs.

pub mod fixtures;
pub mod logging;

/// One row of a table-driven test.
#[derive(Debug, Clone)]
pub struct TestCase<I, E> {
    pub name: &'static str,
    pub input: I,
    pub expected: E,
}

impl<I, E> TestCase<I, E> {
    pub const fn new(name: &'static str, input: I, expected: E) -> Self {
        Self {
            name,
            input,
            expected,
        }
    }
}

/// Run every case and report all mismatches at once, naming each case.
pub fn run_table_tests<I, E, F>(cases: Vec<TestCase<I, E>>, test_fn: F) -> Result<(), String>
where
    I: std::fmt::Debug,
    E: std::fmt::Debug + PartialEq,
    F: Fn(&I) -> E,
{
    let failures: Vec<String> = cases
        .iter()
        .filter_map(|case| {
            let actual = test_fn(&case.input);
            (actual != case.expected).then(|| {
                format!(
                    "'{}': input {:?}, expected {:?}, got {:?}",
                    case.name, case.input, case.expected, actual
                )
            })
        })
        .collect();

    if failures.is_empty() {
        Ok(())
    } else {
        Err(format!(
            "{} of {} cases failed:\n{}",
            failures.len(),
            cases.len(),
            failures.join("\n")
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reports_every_failing_case() {
        let cases = vec![
            TestCase::new("double", 2, 4),
            TestCase::new("wrong", 3, 7),
            TestCase::new("also wrong", 5, 0),
        ];
        let err = run_table_tests(cases, |n| n * 2).unwrap_err();
        assert!(err.starts_with("2 of 3 cases failed"));
        assert!(err.contains("'wrong'"));
        assert!(err.contains("'also wrong'"));
    }
}
