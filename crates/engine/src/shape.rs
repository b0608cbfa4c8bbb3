//! 텔레메트리 셰이프 비교
//!
//! 기대 셰이프와 캡처된 스냅샷을 비교합니다. 이름 패턴은 `*` 와일드카드를
//! 지원합니다 — 런타임마다 서블릿 경로 표기가 미묘하게 달라서 정확 일치만
//! 으로는 매트릭스 전체를 하나의 기대값으로 덮을 수 없기 때문입니다.
//! 비교는 첫 불일치에서 멈추지 않고 모든 문제를 모아 보고합니다.
//!
//! 스냅샷은 상관 id로 케이스 단위로 이미 걸러져 있으므로, 기대 패턴에
//! 대응하지 않는 캡처 트랜잭션/스팬도 불일치로 간주합니다.

use std::fmt;

use tracegrid_core::types::{CapturedTransaction, ExpectedShape, ExpectedTransaction, TelemetrySnapshot};

/// 모든 불일치를 담은 비교 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeMismatch {
    pub problems: Vec<String>,
}

impl fmt::Display for ShapeMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.problems.join("; "))
    }
}

/// `*` 와일드카드 패턴 매칭
///
/// `*`는 0개 이상의 임의 문자와 일치합니다.
pub fn name_matches(pattern: &str, name: &str) -> bool {
    if !pattern.contains('*') {
        return pattern == name;
    }
    let segments: Vec<&str> = pattern.split('*').collect();

    // 첫 세그먼트는 접두, 마지막 세그먼트는 접미여야 한다
    // (패턴이 '*'로 시작/끝나면 해당 세그먼트는 빈 문자열)
    let first = segments[0];
    if !name.starts_with(first) {
        return false;
    }
    let mut rest = &name[first.len()..];

    let last = segments[segments.len() - 1];
    if !rest.ends_with(last) {
        return false;
    }
    rest = &rest[..rest.len() - last.len()];

    // 중간 세그먼트는 남은 문자열에 순서대로 나타나야 한다
    for segment in &segments[1..segments.len() - 1] {
        if segment.is_empty() {
            continue;
        }
        match rest.find(segment) {
            Some(pos) => rest = &rest[pos + segment.len()..],
            None => return false,
        }
    }
    true
}

/// 기대 트랜잭션 하나를 캡처된 트랜잭션과 대조합니다.
fn check_transaction(
    expected: &ExpectedTransaction,
    actual: &CapturedTransaction,
    problems: &mut Vec<String>,
) {
    if expected.status != actual.status {
        problems.push(format!(
            "transaction '{}': expected status {}, got {}",
            actual.name, expected.status, actual.status
        ));
    }
    for span in &expected.spans {
        let found = actual
            .spans
            .iter()
            .filter(|s| name_matches(&span.name, &s.name))
            .count();
        if found != span.count {
            problems.push(format!(
                "transaction '{}': expected {} span(s) matching '{}', got {}",
                actual.name, span.count, span.name, found
            ));
        }
    }
    let mut unexpected: Vec<&str> = Vec::new();
    for span in &actual.spans {
        if expected.spans.iter().any(|e| name_matches(&e.name, &span.name)) {
            continue;
        }
        if !unexpected.contains(&span.name.as_str()) {
            unexpected.push(&span.name);
        }
    }
    for name in unexpected {
        problems.push(format!(
            "transaction '{}': unexpected span '{}'",
            actual.name, name
        ));
    }
}

/// 스냅샷이 기대 셰이프를 만족하는지 검사합니다.
///
/// 모든 기대 트랜잭션이 스냅샷에 존재해야 하고, 어느 기대 이름 패턴에도
/// 대응하지 않는 캡처 트랜잭션이 있으면 그것도 불일치입니다.
pub fn compare(expected: &ExpectedShape, actual: &TelemetrySnapshot) -> Result<(), ShapeMismatch> {
    let mut problems = Vec::new();

    for expectation in &expected.transactions {
        let candidates: Vec<&CapturedTransaction> = actual
            .transactions
            .iter()
            .filter(|t| name_matches(&expectation.name, &t.name))
            .collect();

        match candidates.as_slice() {
            [] => problems.push(format!(
                "no captured transaction matching '{}' (captured: {})",
                expectation.name,
                summarize_names(actual)
            )),
            candidates => {
                // 이름이 일치하는 후보 중 하나라도 완전히 만족하면 통과
                let satisfied = candidates.iter().any(|candidate| {
                    let mut scratch = Vec::new();
                    check_transaction(expectation, candidate, &mut scratch);
                    scratch.is_empty()
                });
                if !satisfied {
                    check_transaction(expectation, candidates[0], &mut problems);
                }
            }
        }
    }

    for transaction in &actual.transactions {
        if !expected
            .transactions
            .iter()
            .any(|e| name_matches(&e.name, &transaction.name))
        {
            problems.push(format!("unexpected transaction '{}'", transaction.name));
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(ShapeMismatch { problems })
    }
}

fn summarize_names(snapshot: &TelemetrySnapshot) -> String {
    if snapshot.transactions.is_empty() {
        return "none".to_owned();
    }
    snapshot
        .transactions
        .iter()
        .map(|t| format!("'{}'", t.name))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracegrid_core::types::{CapturedSpan, ExpectedSpan};

    fn expected(name: &str, status: u16, spans: &[(&str, usize)]) -> ExpectedShape {
        ExpectedShape {
            transactions: vec![ExpectedTransaction {
                name: name.to_owned(),
                status,
                spans: spans
                    .iter()
                    .map(|(n, c)| ExpectedSpan {
                        name: (*n).to_owned(),
                        count: *c,
                    })
                    .collect(),
            }],
        }
    }

    fn captured(name: &str, status: u16, spans: &[&str]) -> TelemetrySnapshot {
        TelemetrySnapshot {
            transactions: vec![CapturedTransaction {
                name: name.to_owned(),
                status,
                spans: spans
                    .iter()
                    .map(|n| CapturedSpan {
                        name: (*n).to_owned(),
                    })
                    .collect(),
            }],
        }
    }

    #[test]
    fn wildcard_pattern_matching() {
        assert!(name_matches("GET /greeter", "GET /greeter"));
        assert!(name_matches("GET /greeter*", "GET /greeter/hello"));
        assert!(name_matches("* /greeter", "GET /greeter"));
        assert!(name_matches("GET /*/hello", "GET /greeter/hello"));
        assert!(name_matches("*", "anything at all"));
        assert!(!name_matches("GET /greeter", "POST /greeter"));
        assert!(!name_matches("GET /*/hello", "GET /greeter/bye"));
        assert!(!name_matches("GET /greeter", "GET /greeter/hello"));
    }

    #[test]
    fn exact_match_passes() {
        let result = compare(
            &expected("GET /greeter", 200, &[("SELECT greetings", 1)]),
            &captured("GET /greeter", 200, &["SELECT greetings"]),
        );
        assert!(result.is_ok());
    }

    #[test]
    fn glob_transaction_name_passes() {
        let result = compare(
            &expected("GET /greeter*", 200, &[]),
            &captured("GET /greeter/hello", 200, &[]),
        );
        assert!(result.is_ok());
    }

    #[test]
    fn status_mismatch_is_reported() {
        let err = compare(
            &expected("GET /greeter", 200, &[]),
            &captured("GET /greeter", 500, &[]),
        )
        .unwrap_err();
        assert_eq!(err.problems.len(), 1);
        assert!(err.problems[0].contains("expected status 200, got 500"));
    }

    #[test]
    fn missing_transaction_lists_captured_names() {
        let err = compare(
            &expected("GET /greeter", 200, &[]),
            &captured("GET /other", 200, &[]),
        )
        .unwrap_err();
        assert!(err.problems[0].contains("no captured transaction matching 'GET /greeter'"));
        assert!(err.problems[0].contains("'GET /other'"));
    }

    #[test]
    fn span_count_mismatch_is_reported() {
        let err = compare(
            &expected("GET /greeter", 200, &[("SELECT *", 2)]),
            &captured("GET /greeter", 200, &["SELECT greetings"]),
        )
        .unwrap_err();
        assert!(err.problems[0].contains("expected 2 span(s) matching 'SELECT *', got 1"));
    }

    #[test]
    fn all_problems_are_collected() {
        let shape = ExpectedShape {
            transactions: vec![
                ExpectedTransaction {
                    name: "GET /a".to_owned(),
                    status: 200,
                    spans: Vec::new(),
                },
                ExpectedTransaction {
                    name: "GET /b".to_owned(),
                    status: 200,
                    spans: Vec::new(),
                },
            ],
        };
        let err = compare(&shape, &captured("GET /c", 200, &[])).unwrap_err();
        assert_eq!(err.problems.len(), 3);
        assert!(err.problems[2].contains("unexpected transaction 'GET /c'"));
    }

    #[test]
    fn extra_captured_transaction_is_reported() {
        let actual = TelemetrySnapshot {
            transactions: vec![
                CapturedTransaction {
                    name: "GET /greeter".to_owned(),
                    status: 200,
                    spans: Vec::new(),
                },
                CapturedTransaction {
                    name: "GET /internal/poller".to_owned(),
                    status: 200,
                    spans: Vec::new(),
                },
            ],
        };
        let err = compare(&expected("GET /greeter", 200, &[]), &actual).unwrap_err();
        assert_eq!(err.problems.len(), 1);
        assert!(err.problems[0].contains("unexpected transaction 'GET /internal/poller'"));
    }

    #[test]
    fn extra_unexpected_span_is_reported() {
        let err = compare(
            &expected("GET /servlet-app/ping", 200, &[]),
            &captured("GET /servlet-app/ping", 200, &["jdbc.query"]),
        )
        .unwrap_err();
        assert_eq!(err.problems.len(), 1);
        assert!(err.problems[0].contains("unexpected span 'jdbc.query'"));
    }

    #[test]
    fn span_sets_match_in_any_order() {
        let result = compare(
            &expected(
                "POST /soap-app/endpoint",
                200,
                &[("soap.dispatch", 1), ("jdbc.query", 1)],
            ),
            &captured(
                "POST /soap-app/endpoint",
                200,
                &["jdbc.query", "soap.dispatch"],
            ),
        );
        assert!(result.is_ok());
    }

    #[test]
    fn missing_expected_span_names_the_span() {
        let err = compare(
            &expected(
                "POST /soap-app/endpoint",
                200,
                &[("soap.dispatch", 1), ("jdbc.query", 1)],
            ),
            &captured("POST /soap-app/endpoint", 200, &["soap.dispatch"]),
        )
        .unwrap_err();
        assert_eq!(err.problems.len(), 1);
        assert!(err.problems[0].contains("expected 1 span(s) matching 'jdbc.query', got 0"));
    }

    #[test]
    fn ambiguous_candidates_pass_if_any_satisfies() {
        let actual = TelemetrySnapshot {
            transactions: vec![
                CapturedTransaction {
                    name: "GET /greeter/a".to_owned(),
                    status: 500,
                    spans: Vec::new(),
                },
                CapturedTransaction {
                    name: "GET /greeter/b".to_owned(),
                    status: 200,
                    spans: Vec::new(),
                },
            ],
        };
        assert!(compare(&expected("GET /greeter*", 200, &[]), &actual).is_ok());
    }
}
