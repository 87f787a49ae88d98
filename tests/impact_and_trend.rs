use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_gradebookd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn gradebookd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn open_with_course(stdin: &mut ChildStdin, reader: &mut BufReader<ChildStdout>) {
    let _ = request_ok(
        stdin,
        reader,
        "open",
        "session.open",
        json!({
            "policy": {
                "weights": [
                    {"name": "Tests", "weight": 0.9},
                    {"name": "Practice", "weight": 0.1},
                ],
                "markRules": [
                    {"mark": "A", "color": "0 255 0", "ratioNeeded": 0.895},
                    {"mark": "E", "color": "255 0 0", "ratioNeeded": null},
                    {"mark": "N/A", "color": "128 128 128"},
                ],
            },
            "gradingPeriods": [
                {"id": "q3", "name": "Quarter 3", "startDate": "01/27/2025", "endDate": "04/04/2025"},
            ],
            "defaultGradingPeriod": "q3",
        }),
    );
    // Overlay order after load: t2 (newest), p1, t1, u1 is unscored.
    let _ = request_ok(
        stdin,
        reader,
        "load",
        "course.load",
        json!({
            "gradingPeriod": "q3",
            "course": {
                "classId": "chem", "name": "Chemistry",
                "assignments": [
                    {"id": "t1", "name": "Quiz 1", "category": "Tests",
                     "dueDate": "02/03/2025", "score": 70, "maxScore": 100},
                    {"id": "t2", "name": "Quiz 2", "category": "Tests",
                     "dueDate": "02/24/2025", "score": 95, "maxScore": 100},
                    {"id": "p1", "name": "Worksheet", "category": "Practice",
                     "dueDate": "02/10/2025", "score": 10, "maxScore": 10},
                    {"id": "u1", "name": "Final", "category": "Tests",
                     "dueDate": "03/20/2025", "score": null, "maxScore": 100},
                ],
            },
        }),
    );
}

#[test]
fn impact_is_the_removal_diff_not_a_linear_share() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    open_with_course(&mut stdin, &mut reader);

    let base = request_ok(
        &mut stdin,
        &mut reader,
        "base",
        "calc.ratio",
        json!({ "gradingPeriod": "q3", "courseId": "chem" }),
    )["ratio"]
        .as_f64()
        .expect("base ratio");

    // Overlay index 0 is the unscored final (newest due date): no impact.
    let none = request_ok(
        &mut stdin,
        &mut reader,
        "i0",
        "calc.impact",
        json!({ "gradingPeriod": "q3", "courseId": "chem", "index": 0 }),
    );
    assert!(none["impact"].is_null());

    // Index 1 is Quiz 2 (95/100). Removing it leaves Tests at 70/100, so
    // the documented formula gives base - (0.7*0.9 + 1.0*0.1).
    let impact = request_ok(
        &mut stdin,
        &mut reader,
        "i1",
        "calc.impact",
        json!({ "gradingPeriod": "q3", "courseId": "chem", "index": 1 }),
    )["impact"]
        .as_f64()
        .expect("impact");
    let expected = base - (0.7 * 0.9 + 1.0 * 0.1);
    assert!((impact - expected).abs() < 1e-9, "got {impact}, want {expected}");
    assert!(impact > 0.0);

    // The same removal computed via an explicit adjustment matches.
    let adjusted = request_ok(
        &mut stdin,
        &mut reader,
        "adj",
        "calc.ratio",
        json!({
            "gradingPeriod": "q3", "courseId": "chem",
            "adjustments": [
                {"category": "Tests", "extraPoints": -95.0, "extraMaxPoints": -100.0},
            ],
        }),
    )["ratio"]
        .as_f64()
        .expect("adjusted ratio");
    assert!((impact - (base - adjusted)).abs() < 1e-9);

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn trend_accumulates_oldest_first_and_ignores_custom_prefix() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    open_with_course(&mut stdin, &mut reader);

    // A custom what-if entry lands at the front of the overlay; the trend
    // axis should not include it.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "add",
        "assignment.add",
        json!({ "gradingPeriod": "q3", "courseId": "chem" }),
    );

    let trend = request_ok(
        &mut stdin,
        &mut reader,
        "trend",
        "calc.trend",
        json!({ "gradingPeriod": "q3", "courseId": "chem" }),
    );
    let points = trend["points"].as_array().expect("points");
    assert_eq!(points.len(), 4);

    // Oldest first: Quiz 1 alone gives 0.7.
    assert_eq!(points[0]["name"], json!("Quiz 1"));
    assert!((points[0]["ratio"].as_f64().expect("ratio") - 0.7).abs() < 1e-9);

    // Worksheet blends in the practice category: 0.7*0.9 + 1.0*0.1.
    assert_eq!(points[1]["name"], json!("Worksheet"));
    assert!((points[1]["ratio"].as_f64().expect("ratio") - 0.73).abs() < 1e-9);

    // Quiz 2 lifts the tests category to 165/200.
    assert_eq!(points[2]["name"], json!("Quiz 2"));
    let expected = (165.0 / 200.0) * 0.9 + 1.0 * 0.1;
    assert!((points[2]["ratio"].as_f64().expect("ratio") - expected).abs() < 1e-9);

    // The unscored final is on the axis but does not move the grade.
    assert_eq!(points[3]["name"], json!("Final"));
    assert_eq!(points[3]["scored"], json!(false));
    assert!(
        (points[3]["ratio"].as_f64().expect("ratio")
            - points[2]["ratio"].as_f64().expect("ratio"))
        .abs()
            < 1e-12
    );

    drop(stdin);
    let _ = child.wait();
}
