#[cfg(test)]
mod tests {
    use std::time::Duration;
    use tokio::time::Instant;

    use crate::browser::fake::{FakeLauncher, ViewBehavior};
    use crate::capture::orchestrator::CaptureOrchestrator;
    use crate::capture::types::{
        CameraSettings, CaptureErrorKind, CaptureRequest, OverallStatus, Vector3, ViewCaptureResult,
        ViewName,
    };
    use crate::configuration::types::{CaptureSettings, ViewportConfig};
    use crate::error_handling::types::OrchestratorError;

    const RED: [u8; 3] = [200, 30, 30];
    const BLUE: [u8; 3] = [20, 40, 220];

    fn settings() -> CaptureSettings {
        CaptureSettings {
            render_target_base_url: "http://render.test/capture".to_string(),
            viewport: ViewportConfig {
                width: 10,
                height: 10,
                device_scale_factor: 1.0,
            },
            ..CaptureSettings::default()
        }
    }

    fn camera() -> CameraSettings {
        CameraSettings {
            field_of_view: 45.0,
            position: Vector3::new(0.0, 1.2, 3.5),
            target: Vector3::new(0.0, 1.0, 0.0),
            ..CameraSettings::default()
        }
    }

    fn request(id: &str) -> CaptureRequest {
        CaptureRequest::new(id, camera()).unwrap()
    }

    fn assert_torn_down(launcher: &FakeLauncher) {
        let counters = launcher.counters();
        assert_eq!(counters.launches(), counters.terminations());
        assert_eq!(counters.contexts_opened(), counters.contexts_closed());
        assert_eq!(counters.live_contexts(), 0);
    }

    fn decoded(view: &ViewCaptureResult) -> image::RgbaImage {
        image::load_from_memory(view.image_bytes().expect("view should have succeeded"))
            .unwrap()
            .to_rgba8()
    }

    #[tokio::test]
    async fn complete_capture_produces_two_pngs_of_viewport_size() {
        let _ = env_logger::builder().is_test(true).try_init();
        let launcher = FakeLauncher::per_view(ViewBehavior::solid(RED), ViewBehavior::solid(BLUE));
        let orchestrator = CaptureOrchestrator::new(launcher.clone(), settings());

        let result = orchestrator.capture(request("abc123")).await.unwrap();

        assert_eq!(result.overall_status(), OverallStatus::Complete);
        assert_eq!(result.customization_id(), "abc123");
        for view in ViewName::ALL {
            let outcome = result.view(view);
            assert_eq!(outcome.view(), view);
            match outcome {
                ViewCaptureResult::Success { encoding, .. } => assert_eq!(*encoding, "image/png"),
                other => panic!("expected success, got {:?}", other),
            }
            let image = decoded(outcome);
            assert_eq!(image.dimensions(), (10, 10));
        }
        assert_eq!(decoded(result.front()).get_pixel(0, 0).0, [200, 30, 30, 255]);
        assert_eq!(decoded(result.back()).get_pixel(9, 9).0, [20, 40, 220, 255]);

        let counters = launcher.counters();
        let mut navigations = counters.navigations();
        navigations.sort();
        assert_eq!(
            navigations,
            vec![
                "http://render.test/capture/abc123/back".to_string(),
                "http://render.test/capture/abc123/front".to_string(),
            ]
        );
        assert_eq!(counters.applied_settings(), vec![camera(), camera()]);
        assert_eq!(counters.launches(), 1);
        assert_torn_down(&launcher);
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_front_view_does_not_delay_back_view() {
        let launcher = FakeLauncher::per_view(ViewBehavior::Hang, ViewBehavior::solid(BLUE));
        let reference = FakeLauncher::rendering(ViewBehavior::solid(BLUE));
        let orchestrator = CaptureOrchestrator::new(launcher.clone(), settings());

        let started = Instant::now();
        let result = orchestrator.capture(request("abc123")).await.unwrap();
        let elapsed = started.elapsed();

        assert_eq!(result.overall_status(), OverallStatus::PartialFailure);
        assert_eq!(result.front().error_kind(), Some(CaptureErrorKind::Timeout));
        assert!(result.back().is_success());

        // Back was exported right away, front only gave up after the load budget.
        let back_done = launcher.counters().export_time(ViewName::Back).unwrap();
        assert!(back_done - started < Duration::from_secs(1));
        assert!(elapsed >= Duration::from_secs(120));
        assert!(launcher.counters().export_time(ViewName::Front).is_none());

        let alone = CaptureOrchestrator::new(reference, settings())
            .capture(request("abc123"))
            .await
            .unwrap();
        assert_eq!(result.back().image_bytes(), alone.back().image_bytes());
        assert_torn_down(&launcher);
    }

    #[tokio::test]
    async fn load_errors_on_both_views_are_a_total_failure() {
        let launcher = FakeLauncher::rendering(ViewBehavior::LoadError(
            "net::ERR_CONNECTION_REFUSED".to_string(),
        ));
        let orchestrator = CaptureOrchestrator::new(launcher.clone(), settings());

        let result = orchestrator.capture(request("abc123")).await.unwrap();

        assert_eq!(result.overall_status(), OverallStatus::TotalFailure);
        for view in ViewName::ALL {
            assert_eq!(
                result.view(view).error_kind(),
                Some(CaptureErrorKind::NavigationError)
            );
        }
        match result.front() {
            ViewCaptureResult::Failure { message, .. } => {
                assert!(message.contains("ERR_CONNECTION_REFUSED"))
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert_torn_down(&launcher);
    }

    #[tokio::test]
    async fn launch_failure_surfaces_as_error_without_leaks() {
        let launcher = FakeLauncher::failing_launch();
        let orchestrator = CaptureOrchestrator::new(launcher.clone(), settings());

        let err = orchestrator.capture(request("abc123")).await.unwrap_err();

        assert!(matches!(err, OrchestratorError::Launch(_)));
        assert_eq!(launcher.counters().contexts_opened(), 0);
        assert_torn_down(&launcher);
    }

    #[tokio::test]
    async fn repeated_captures_are_byte_identical() {
        let launcher = FakeLauncher::per_view(ViewBehavior::solid(RED), ViewBehavior::solid(BLUE));
        let orchestrator = CaptureOrchestrator::new(launcher.clone(), settings());

        let first = orchestrator.capture(request("abc123")).await.unwrap();
        let second = orchestrator.capture(request("abc123")).await.unwrap();

        assert_ne!(first.request_id(), second.request_id());
        assert_eq!(first.front().image_bytes(), second.front().image_bytes());
        assert_eq!(first.back().image_bytes(), second.back().image_bytes());
        assert_eq!(launcher.counters().launches(), 2);
        assert_torn_down(&launcher);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_surface_is_reported_after_polling() {
        let launcher = FakeLauncher::per_view(ViewBehavior::solid(RED), ViewBehavior::NoSurface);
        let orchestrator = CaptureOrchestrator::new(launcher.clone(), settings());

        let started = Instant::now();
        let result = orchestrator.capture(request("abc123")).await.unwrap();

        assert_eq!(result.overall_status(), OverallStatus::PartialFailure);
        assert!(result.front().is_success());
        assert_eq!(result.back().error_kind(), Some(CaptureErrorKind::NoSurface));
        assert!(started.elapsed() >= settings().surface_timeout);
        assert_torn_down(&launcher);
    }

    #[tokio::test]
    async fn failed_or_invalid_exports_are_encoding_errors() {
        let launcher = FakeLauncher::per_view(
            ViewBehavior::EncodeFailure("SecurityError: tainted canvas".to_string()),
            ViewBehavior::Garbage,
        );
        let orchestrator = CaptureOrchestrator::new(launcher.clone(), settings());

        let result = orchestrator.capture(request("abc123")).await.unwrap();

        assert_eq!(result.overall_status(), OverallStatus::TotalFailure);
        assert_eq!(result.front().error_kind(), Some(CaptureErrorKind::EncodingError));
        assert_eq!(result.back().error_kind(), Some(CaptureErrorKind::EncodingError));
        assert_torn_down(&launcher);
    }

    #[tokio::test(start_paused = true)]
    async fn session_deadline_bounds_both_views() {
        let launcher = FakeLauncher::per_view(
            ViewBehavior::slow(RED, Duration::from_secs(60)),
            ViewBehavior::solid(BLUE),
        );
        let short_session = CaptureSettings {
            session_timeout: Duration::from_secs(30),
            ..settings()
        };
        let orchestrator = CaptureOrchestrator::new(launcher.clone(), short_session);

        let result = orchestrator.capture(request("abc123")).await.unwrap();

        assert_eq!(result.overall_status(), OverallStatus::PartialFailure);
        match result.front() {
            ViewCaptureResult::Failure {
                error_kind,
                message,
                ..
            } => {
                assert_eq!(*error_kind, CaptureErrorKind::Timeout);
                assert!(message.contains("deadline"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert!(result.back().is_success());
        assert_torn_down(&launcher);
    }

    #[tokio::test]
    async fn panic_in_one_view_releases_everything_and_spares_the_other() {
        let launcher = FakeLauncher::per_view(ViewBehavior::Panic, ViewBehavior::solid(BLUE));
        let orchestrator = CaptureOrchestrator::new(launcher.clone(), settings());

        let err = orchestrator.capture(request("abc123")).await.unwrap_err();

        match err {
            OrchestratorError::Internal(message) => {
                assert!(message.contains("render target crashed"))
            }
            other => panic!("expected internal error, got {:?}", other),
        }
        let counters = launcher.counters();
        assert_eq!(counters.launches(), 1);
        assert_eq!(counters.contexts_opened(), 2);
        assert!(counters.export_time(ViewName::Back).is_some());
        assert_torn_down(&launcher);
    }
}
