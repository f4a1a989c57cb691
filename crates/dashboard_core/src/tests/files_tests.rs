use super::*;

#[tokio::test]
async fn correlated_response_resolves_the_waiter() {
    let requests = FileRequests::new();
    let listing = requests.register();
    let message = listing.request_message();
    assert_eq!(message.event, REQUEST_PRINTER_FILES);
    assert_eq!(message.data["request_id"], listing.request_id.as_str());

    let response = json!({
        "request_id": &listing.request_id,
        "success": true,
        "files": [{"name": "gear.ctb", "size": 10}],
        "count": 1
    });
    assert!(requests.handle_response(&response));

    let files = requests
        .wait(listing, FILE_REQUEST_TIMEOUT)
        .await
        .expect("listing");
    assert_eq!(files.files[0].name, "gear.ctb");
    assert_eq!(requests.pending_count(), 0);
}

#[tokio::test]
async fn uncorrelated_responses_are_dropped() {
    let requests = FileRequests::new();
    let _listing = requests.register();
    assert!(!requests.handle_response(&json!({"request_id": "someone-else", "files": []})));
    assert!(!requests.handle_response(&json!({"files": []})));
    assert_eq!(requests.pending_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn waiting_times_out_after_ten_seconds() {
    let requests = FileRequests::new();
    let listing = requests.register();
    let request_id = listing.request_id.clone();

    let err = requests
        .wait(listing, FILE_REQUEST_TIMEOUT)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Timeout(_)));
    assert_eq!(requests.pending_count(), 0);

    let late = json!({"request_id": request_id, "files": []});
    assert!(!requests.handle_response(&late));
}

#[tokio::test]
async fn failed_listing_is_a_rejection() {
    let requests = FileRequests::new();
    let listing = requests.register();
    requests.handle_response(&json!({
        "request_id": &listing.request_id,
        "success": false,
        "message": "printer offline"
    }));
    let err = requests
        .wait(listing, FILE_REQUEST_TIMEOUT)
        .await
        .unwrap_err();
    assert_eq!(err.user_message(), "printer offline");
}
