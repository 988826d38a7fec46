// src/main.rs

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::error::Error;

// Response types
#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
}

#[derive(Debug, Deserialize)]
struct ReadinessResponse {
    ready_for_submission: bool,
    errors: Vec<String>,
    warnings: Vec<String>,
    session_count: usize,
}

#[derive(Debug, Deserialize)]
struct DaySummaryResponse {
    total_sessions: usize,
    total_hours: String,
}

// Doctor and date used by the run; the doctor must exist in the server's roster.
const DOCTOR_ID: &str = "DOC001";
const DATE: &str = "2025-07-28";
const MONTH: &str = "2025-07";

fn batch(sessions: Value) -> Value {
    json!({
        "doctor_id": DOCTOR_ID,
        "date": DATE,
        "sessions": sessions,
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let base_url = std::env::var("SMOKE_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());
    let client = Client::new();

    // Test 1: Health check
    println!("\n🔍 Testing health check endpoint...");
    let health_response = client
        .get(format!("{}/health", base_url))
        .send()
        .await?
        .json::<HealthResponse>()
        .await?;
    println!("Health check response: {:?}", health_response);
    if health_response.status != "ok" {
        return Err(format!("unexpected health status: {}", health_response.status).into());
    }

    let two_sessions = json!([
        {"date": DATE, "start_time": "09:00", "end_time": "12:00", "scribe_name": "Alice", "patient_number": 12345},
        {"date": DATE, "start_time": "14:00", "end_time": "17:00", "scribe_name": "Bob", "patient_number": 67890}
    ]);

    // Test 2: Readiness of a clean two-session batch
    println!("\n🔍 Checking readiness for {} on {}...", DOCTOR_ID, DATE);
    let readiness = client
        .post(format!("{}/api/readiness", base_url))
        .json(&batch(two_sessions.clone()))
        .send()
        .await?
        .json::<ReadinessResponse>()
        .await?;
    println!(
        "Ready: {}, errors: {:?}, warnings: {:?}",
        readiness.ready_for_submission, readiness.errors, readiness.warnings
    );
    if !readiness.ready_for_submission {
        println!("⚠️ Batch is not ready (sessions may already be stored for this day): {:?}", readiness.errors);
    }

    // Test 3: Submit
    println!("\n🔍 Submitting {} sessions...", readiness.session_count);
    let submit_response = client
        .post(format!("{}/api/submissions", base_url))
        .json(&batch(two_sessions))
        .send()
        .await?;
    let submit_status = submit_response.status();
    let submit_body = submit_response.json::<Value>().await?;
    println!("Submit status: {}", submit_status);
    println!("Submit body: {}", serde_json::to_string_pretty(&submit_body)?);

    // Test 4: Day summary
    println!("\n🔍 Fetching day summary...");
    let summary = client
        .get(format!("{}/api/day-summary", base_url))
        .query(&[("doctor_id", DOCTOR_ID), ("date", DATE)])
        .send()
        .await?
        .json::<DaySummaryResponse>()
        .await?;
    println!("Day summary: {} sessions, {}h", summary.total_sessions, summary.total_hours);

    // Test 5: A third session on the same day must be refused
    println!("\n🔍 Submitting a third session for the same day...");
    let third = json!([
        {"date": DATE, "start_time": "18:00", "end_time": "19:00", "scribe_name": "Carol", "patient_number": 11111}
    ]);
    let third_response = client
        .post(format!("{}/api/submissions", base_url))
        .json(&batch(third))
        .send()
        .await?;
    let third_status = third_response.status();
    println!("Third session status: {}", third_status);
    println!("Third session body: {}", third_response.text().await?);
    if third_status != StatusCode::UNPROCESSABLE_ENTITY {
        return Err(format!("expected 422 for the third session, got {}", third_status).into());
    }

    // Test 6: Monthly report
    println!("\n🔍 Fetching {} report for {}...", MONTH, DOCTOR_ID);
    let report_response = client
        .get(format!("{}/api/reports/{}", base_url, DOCTOR_ID))
        .query(&[("month", MONTH)])
        .send()
        .await?;
    println!("Report status: {}", report_response.status());
    let report = report_response.json::<Value>().await?;
    println!("Monthly total: {}", report["monthly_total_label"]);
    if let Some(row) = report["rows"]
        .as_array()
        .and_then(|rows| rows.iter().find(|row| row["date"] == DATE))
    {
        println!("Row for {}: {}", DATE, row);
    }

    // Test 7: Analytics
    println!("\n🔍 Fetching analytics for {}...", MONTH);
    let analytics = client
        .get(format!("{}/api/analytics", base_url))
        .query(&[("month", MONTH), ("doctor_id", DOCTOR_ID)])
        .send()
        .await?
        .json::<Value>()
        .await?;
    println!(
        "Sessions: {}, hours: {}, busiest day: {}",
        analytics["total_sessions"], analytics["total_hours"], analytics["busiest_day"]
    );

    println!("\n✅ Smoke run finished");
    Ok(())
}
