
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::sync::oneshot;

    async fn fail(cb: &CircuitBreaker) -> Result<(), BreakerError<&'static str>> {
        cb.execute(|| async { Err::<(), _>("boom") }).await
    }

    async fn succeed(cb: &CircuitBreaker) -> Result<(), BreakerError<&'static str>> {
        cb.execute(|| async { Ok::<(), &'static str>(()) }).await
    }

    fn breaker_with(config: CircuitBreakerConfig) -> CircuitBreaker {
        CircuitBreaker::new("test", config)
    }

    async fn trip(cb: &CircuitBreaker) {
        let _ = succeed(cb).await;
        let _ = fail(cb).await;
        let _ = fail(cb).await;
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn test_circuit_breaker_config_defaults() {
        let config = CircuitBreakerConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.min_request_threshold, 3);
        assert_eq!(config.failure_ratio_threshold, 0.4);
        assert!(config.count_interval.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_circuit_breaker_config_builder() {
        let config = CircuitBreakerConfig::new()
            .with_timeout(Duration::from_secs(60))
            .with_min_request_threshold(10)
            .with_failure_ratio_threshold(0.5)
            .with_count_interval(Duration::from_secs(120));

        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.min_request_threshold, 10);
        assert_eq!(config.failure_ratio_threshold, 0.5);
        assert_eq!(config.count_interval, Some(Duration::from_secs(120)));
    }

    #[test]
    fn test_circuit_breaker_config_validation() {
        let config = CircuitBreakerConfig::new();
        assert!(config.clone().with_min_request_threshold(0).validate().is_err());
        assert!(config.clone().with_failure_ratio_threshold(0.0).validate().is_err());
        assert!(config.clone().with_failure_ratio_threshold(1.5).validate().is_err());
        assert!(config.clone().with_failure_ratio_threshold(f64::NAN).validate().is_err());
        assert!(config.with_count_interval(Duration::ZERO).validate().is_err());
    }

    #[test]
    fn test_counts_failure_ratio() {
        let mut counts = Counts::default();
        assert_eq!(counts.failure_ratio(), 0.0);

        counts.on_request();
        counts.on_failure();
        counts.on_request();
        counts.on_success();
        assert_eq!(counts.failure_ratio(), 0.5);
        assert_eq!(counts.consecutive_failures, 0);
        assert_eq!(counts.consecutive_successes, 1);
    }

    #[tokio::test]
    async fn test_circuit_breaker_initial_state() {
        let cb = CircuitBreaker::with_defaults("market-api");
        assert_eq!(cb.name(), "market-api");
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.counts(), Counts::default());
        assert_eq!(cb.generation(), 0);
    }

    #[tokio::test]
    async fn test_closed_state_counts() {
        let cb = CircuitBreaker::with_defaults("test");

        succeed(&cb).await.unwrap();
        assert!(fail(&cb).await.is_err());

        let counts = cb.counts();
        assert_eq!(counts.requests, 2);
        assert_eq!(counts.total_failures, 1);
        assert_eq!(counts.consecutive_failures, 1);
        assert_eq!(counts.consecutive_successes, 0);
    }

    #[tokio::test]
    async fn test_cold_breaker_does_not_trip_below_min_requests() {
        let cb = CircuitBreaker::with_defaults("test");

        // 1/1 and 2/2 failures, but fewer than 3 requests
        let _ = fail(&cb).await;
        assert_eq!(cb.state(), CircuitState::Closed);
        let _ = fail(&cb).await;
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.counts().total_failures, 2);
    }

    #[tokio::test]
    async fn test_trips_at_three_requests_and_rejects_next_call() {
        let cb = CircuitBreaker::with_defaults("test");
        let generation = cb.generation();

        succeed(&cb).await.unwrap();
        let _ = fail(&cb).await;
        let _ = fail(&cb).await;

        // 2 failures / 3 requests = 0.667 >= 0.4
        assert_eq!(cb.state(), CircuitState::Open);
        assert_eq!(cb.counts(), Counts::default());
        assert_eq!(cb.generation(), generation + 1);

        let invoked = AtomicU32::new(0);
        let result: Result<(), BreakerError<&str>> = cb
            .execute(|| async {
                invoked.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(BreakerError::Open { ref name }) if name == "test"));
        assert_eq!(invoked.load(Ordering::SeqCst), 0);
        // Rejections are not counted
        assert_eq!(cb.counts(), Counts::default());
    }

    #[tokio::test]
    async fn test_low_failure_ratio_keeps_circuit_closed() {
        let cb = CircuitBreaker::with_defaults("test");

        for _ in 0..4 {
            succeed(&cb).await.unwrap();
        }
        let _ = fail(&cb).await; // 1/5
        let _ = fail(&cb).await; // 2/6
        assert_eq!(cb.state(), CircuitState::Closed);

        let _ = fail(&cb).await; // 3/7 = 0.43
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn test_success_does_not_evaluate_trip() {
        let cb = CircuitBreaker::with_defaults("test");

        let _ = fail(&cb).await;
        let _ = fail(&cb).await;
        succeed(&cb).await.unwrap();

        // 2/3 failures, but the predicate only runs after a failure
        assert_eq!(cb.state(), CircuitState::Closed);
        let counts = cb.counts();
        assert_eq!(counts.requests, 3);
        assert_eq!(counts.total_failures, 2);
        assert_eq!(counts.consecutive_successes, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_only_after_timeout() {
        let cb = breaker_with(CircuitBreakerConfig::new().with_timeout(Duration::from_secs(5)));
        trip(&cb).await;
        let generation = cb.generation();

        tokio::time::advance(Duration::from_millis(4_900)).await;
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(fail(&cb).await.unwrap_err().is_open());

        tokio::time::advance(Duration::from_millis(100)).await;
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert_eq!(cb.generation(), generation + 1);
        assert_eq!(cb.counts(), Counts::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_trial_closes_circuit() {
        let cb = breaker_with(CircuitBreakerConfig::new());
        trip(&cb).await;
        tokio::time::advance(Duration::from_secs(5)).await;

        succeed(&cb).await.unwrap();

        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.counts(), Counts::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_trial_reopens_with_fresh_timeout() {
        let cb = breaker_with(CircuitBreakerConfig::new());
        trip(&cb).await;
        tokio::time::advance(Duration::from_secs(5)).await;

        let result = fail(&cb).await;
        assert!(matches!(result, Err(BreakerError::Operation("boom"))));
        assert_eq!(cb.state(), CircuitState::Open);

        tokio::time::advance(Duration::from_secs(4)).await;
        assert_eq!(cb.state(), CircuitState::Open);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(cb.state(), CircuitState::HalfOpen);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_admits_single_trial() {
        let cb = Arc::new(breaker_with(CircuitBreakerConfig::new()));
        trip(&cb).await;
        tokio::time::advance(Duration::from_secs(5)).await;

        let (release_tx, release_rx) = oneshot::channel::<()>();
        let trial_cb = Arc::clone(&cb);
        let trial = tokio::spawn(async move {
            trial_cb
                .execute(|| async move {
                    let _ = release_rx.await;
                    Ok::<_, &'static str>("recovered")
                })
                .await
        });
        tokio::task::yield_now().await;
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        let invoked = AtomicU32::new(0);
        let second: Result<(), BreakerError<&str>> = cb
            .execute(|| async {
                invoked.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;
        assert!(second.unwrap_err().is_open());
        assert_eq!(invoked.load(Ordering::SeqCst), 0);

        release_tx.send(()).unwrap();
        assert_eq!(trial.await.unwrap().unwrap(), "recovered");
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_trial_frees_slot() {
        let cb = breaker_with(CircuitBreakerConfig::new());
        trip(&cb).await;
        tokio::time::advance(Duration::from_secs(5)).await;

        let abandoned = tokio::time::timeout(
            Duration::from_millis(10),
            cb.execute(|| std::future::pending::<Result<(), &'static str>>()),
        )
        .await;
        assert!(abandoned.is_err());
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        succeed(&cb).await.unwrap();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_abandoned_result_is_not_counted() {
        let cb = CircuitBreaker::with_defaults("test");

        let result: Result<(), BreakerError<&str>> = cb
            .execute_unless(|| async { Err("cancelled") }, |e: &&str| *e == "cancelled")
            .await;

        assert!(matches!(result, Err(BreakerError::Operation("cancelled"))));
        assert_eq!(cb.counts().total_failures, 0);
        assert_eq!(cb.counts().consecutive_failures, 0);

        // Other errors still count
        let _ = cb
            .execute_unless(|| async { Err::<(), _>("boom") }, |e: &&str| *e == "cancelled")
            .await;
        assert_eq!(cb.counts().total_failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_trial_frees_slot() {
        let cb = breaker_with(CircuitBreakerConfig::new());
        trip(&cb).await;
        tokio::time::advance(Duration::from_secs(5)).await;

        let _ = cb
            .execute_unless(|| async { Err::<(), _>("cancelled") }, |_: &&str| true)
            .await;
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        succeed(&cb).await.unwrap();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_stale_closed_result_is_discarded() {
        let cb = Arc::new(CircuitBreaker::with_defaults("test"));

        let (release_tx, release_rx) = oneshot::channel::<()>();
        let slow_cb = Arc::clone(&cb);
        let slow = tokio::spawn(async move {
            slow_cb
                .execute(|| async move {
                    let _ = release_rx.await;
                    Err::<(), _>("late failure")
                })
                .await
        });
        tokio::task::yield_now().await;

        // The slow call counts as request 1; two failures trip the breaker
        let _ = fail(&cb).await;
        let _ = fail(&cb).await;
        assert_eq!(cb.state(), CircuitState::Open);
        let generation = cb.generation();

        release_tx.send(()).unwrap();
        let result = slow.await.unwrap();
        assert!(matches!(result, Err(BreakerError::Operation("late failure"))));

        // The late result belongs to the previous generation
        assert_eq!(cb.state(), CircuitState::Open);
        assert_eq!(cb.generation(), generation);
        assert_eq!(cb.counts(), Counts::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_trial_does_not_drive_transition() {
        let cb = Arc::new(breaker_with(CircuitBreakerConfig::new()));
        trip(&cb).await;
        tokio::time::advance(Duration::from_secs(5)).await;

        let (release_tx, release_rx) = oneshot::channel::<()>();
        let trial_cb = Arc::clone(&cb);
        let trial = tokio::spawn(async move {
            trial_cb
                .execute(|| async move {
                    let _ = release_rx.await;
                    Err::<(), _>("trial failed")
                })
                .await
        });
        tokio::task::yield_now().await;

        // Someone else moves the breaker on while the trial is in flight
        cb.reset();
        assert_eq!(cb.state(), CircuitState::Closed);

        release_tx.send(()).unwrap();
        let _ = trial.await.unwrap();

        // A failed stale trial must not reopen the circuit
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.counts(), Counts::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_state_change_hook_sees_every_transition() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let cb = CircuitBreaker::new("market-api", CircuitBreakerConfig::new()).with_state_change_hook(
            Arc::new(move |name: &str, from: CircuitState, to: CircuitState| {
                sink.lock().unwrap().push((name.to_string(), from, to));
            }),
        );

        trip(&cb).await;
        tokio::time::advance(Duration::from_secs(5)).await;
        succeed(&cb).await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![
                ("market-api".to_string(), CircuitState::Closed, CircuitState::Open),
                ("market-api".to_string(), CircuitState::Open, CircuitState::HalfOpen),
                ("market-api".to_string(), CircuitState::HalfOpen, CircuitState::Closed),
            ]
        );
    }

    #[tokio::test]
    async fn test_panicking_hook_does_not_fail_call() {
        let cb = CircuitBreaker::with_defaults("test").with_state_change_hook(Arc::new(
            |_: &str, _: CircuitState, _: CircuitState| panic!("monitoring is down"),
        ));

        succeed(&cb).await.unwrap();
        let _ = fail(&cb).await;
        let result = fail(&cb).await;

        assert!(matches!(result, Err(BreakerError::Operation("boom"))));
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_count_interval_clears_closed_counts() {
        let cb = CircuitBreaker::new(
            "test",
            CircuitBreakerConfig::new().with_count_interval(Duration::from_secs(10)),
        );

        let _ = fail(&cb).await;
        let _ = fail(&cb).await;
        tokio::time::advance(Duration::from_secs(10)).await;

        let _ = fail(&cb).await;
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.counts().requests, 1);
    }

    #[tokio::test]
    async fn test_concurrent_closed_callers() {
        let cb = Arc::new(CircuitBreaker::with_defaults("test"));

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let cb = Arc::clone(&cb);
                tokio::spawn(async move { succeed(&cb).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let counts = cb.counts();
        assert_eq!(counts.requests, 10);
        assert_eq!(counts.consecutive_successes, 10);
    }

    #[tokio::test]
    async fn test_circuit_breaker_reset() {
        let cb = CircuitBreaker::with_defaults("test");
        trip(&cb).await;

        cb.reset();
        assert_eq!(cb.state(), CircuitState::Closed);
        succeed(&cb).await.unwrap();
    }

    #[test]
    fn test_circuit_state_display() {
        assert_eq!(format!("{}", CircuitState::Closed), "Closed");
        assert_eq!(format!("{}", CircuitState::Open), "Open");
        assert_eq!(format!("{}", CircuitState::HalfOpen), "HalfOpen");
    }

    #[test]
    fn test_circuit_state_gauge_values() {
        assert_eq!(CircuitState::Closed.as_gauge(), 0);
        assert_eq!(CircuitState::Open.as_gauge(), 1);
        assert_eq!(CircuitState::HalfOpen.as_gauge(), 2);
    }

    #[test]
    fn test_breaker_error_display() {
        let err: BreakerError<&str> = BreakerError::Open {
            name: "market-api".to_string(),
        };
        assert_eq!(err.to_string(), "circuit breaker 'market-api' is open");

        let err: BreakerError<&str> = BreakerError::Operation("timeout");
        assert_eq!(err.to_string(), "timeout");
    }
