//! # Integration Test Flows
//!
//! Flows that go from the prover setup down to the execution contexts:
//!
//! 1. **Setup → pooled ops**: a bootstrapped context computes the same FFT and
//!    MSM as a single context
//! 2. **Correlation**: many concurrent requests on one slot each get their own
//!    response
//! 3. **Failure isolation**: a failing sub-task or engine fault leaves the
//!    pool usable
//! 4. **Teardown**: after shutdown, pooled calls fail instead of hanging

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;

    use futures::future::try_join_all;
    use rand::rngs::StdRng;
    use rand::{RngCore, SeedableRng};

    use zk_crypto::SeededRandomSource;
    use zk_dispatch::DispatchError;
    use zk_engine::reference::msm::naive_msm;
    use zk_engine::{EngineImage, FieldElement, ReferenceImage};
    use zk_pool::{PoolConfig, PoolError, PoolState, PooledFft, PooledTaskRunner, WorkerPool};
    use zk_prover::{CrsLoader, MemoryCrs, ProverSetup, ProvingContext};

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    const GUARD: Duration = Duration::from_secs(30);

    fn image() -> EngineImage {
        Arc::new(ReferenceImage)
    }

    /// Serialized constraint system whose header declares `gates` gates.
    fn constraint_system(gates: u32) -> Vec<u8> {
        let mut cs = gates.to_le_bytes().to_vec();
        cs.extend_from_slice(&[0u8; 60]);
        cs
    }

    fn elements(n: usize, seed: u64) -> Vec<FieldElement> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n).map(|_| FieldElement::new(rng.next_u64())).collect()
    }

    fn pack(values: &[FieldElement]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    async fn proving_context(slots: usize, gates: u32, crs: &mut MemoryCrs) -> ProvingContext {
        ProverSetup::new(image(), PoolConfig::default().with_size(slots))
            .with_random_source(Arc::new(SeededRandomSource::new(42)))
            .run(crs, &constraint_system(gates))
            .await
            .unwrap()
    }

    // =============================================================================
    // SETUP → POOLED OPERATIONS
    // =============================================================================

    #[tokio::test]
    async fn test_bootstrapped_fft_matches_single_context() {
        let mut crs = MemoryCrs::random(160, &SeededRandomSource::new(1)).unwrap();
        let ctx = proving_context(4, 100, &mut crs).await;
        assert_eq!(ctx.circuit_size(), 128);

        let coeffs = pack(&elements(128, 7));
        let pooled = timeout(GUARD, ctx.fft().fft(&coeffs)).await.unwrap().unwrap();

        // Same polynomial on the primary slot alone.
        let primary = ctx.primary().unwrap();
        let domain = primary.new_evaluation_domain(128u64).await.unwrap();
        let addr = primary.transfer_to_heap(&coeffs).await.unwrap();
        let single = primary.fft(domain, addr).await.unwrap();
        primary.bbfree(addr).await.unwrap();

        assert_eq!(pooled, single);
        ctx.shutdown().await;
    }

    #[tokio::test]
    async fn test_bootstrapped_msm_matches_naive() {
        let mut crs = MemoryCrs::random(160, &SeededRandomSource::new(2)).unwrap();
        let ctx = proving_context(3, 60, &mut crs).await;
        assert_eq!(ctx.pippenger().num_points(), Some(65));

        let points: Vec<FieldElement> = crs
            .get_data()
            .unwrap()
            .chunks_exact(8)
            .map(|c| FieldElement::from_le_bytes(c).unwrap())
            .collect();
        let scalars = elements(65, 9);

        let result = timeout(GUARD, ctx.pippenger().msm(&pack(&scalars)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            FieldElement::from_le_bytes(&result),
            Some(naive_msm(&points, &scalars))
        );

        // Offset window in the middle of the table.
        let window = elements(20, 10);
        let result = ctx
            .pippenger()
            .pippenger_unsafe(&pack(&window), 30, 20)
            .await
            .unwrap();
        assert_eq!(
            FieldElement::from_le_bytes(&result),
            Some(naive_msm(&points[30..50], &window))
        );
        ctx.shutdown().await;
    }

    // =============================================================================
    // CORRELATION UNDER CONCURRENCY
    // =============================================================================

    #[tokio::test]
    async fn test_concurrent_requests_route_to_their_callers() {
        let pool = WorkerPool::create(image(), PoolConfig::default().with_size(2))
            .await
            .unwrap();
        let worker = pool.primary().unwrap();

        let payloads: Vec<Vec<u8>> = (0..64u8)
            .map(|i| vec![i; 8 + usize::from(i)])
            .collect();
        let echoed = timeout(
            GUARD,
            try_join_all(payloads.iter().map(|payload| {
                let worker = worker.clone();
                async move {
                    let addr = worker.transfer_to_heap(payload).await?;
                    let back = worker.transfer_from_heap(addr, payload.len() as u64).await?;
                    worker.bbfree(addr).await?;
                    Ok::<_, DispatchError>(back)
                }
            })),
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(echoed, payloads);
        assert_eq!(worker.proxy().pending_calls(), 0);
        pool.destroy().await;
    }

    // =============================================================================
    // FAILURE ISOLATION
    // =============================================================================

    #[tokio::test]
    async fn test_failed_subtask_leaves_pool_usable() {
        let pool = Arc::new(
            WorkerPool::create(image(), PoolConfig::default().with_size(4))
                .await
                .unwrap(),
        );
        let runner = PooledTaskRunner::new(pool.clone());

        let err = runner
            .run("mixed", 10, |task| async move {
                if task.slot == 3 {
                    task.worker.proxy().call("no_such_op", Vec::new()).await?;
                }
                task.worker.bbmalloc(task.range.len() as u64).await
            })
            .await
            .unwrap_err();
        match err {
            PoolError::SubtaskFailed { range, slot, source, .. } => {
                assert_eq!(range, 6..10);
                assert_eq!(slot, 3);
                assert!(matches!(source, DispatchError::UnknownOperation { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }

        let fft = PooledFft::new(pool.clone());
        fft.init(16).await.unwrap();
        let out = fft.fft(&pack(&elements(16, 3))).await.unwrap();
        assert_eq!(out.len(), 16 * 8);
        pool.destroy().await;
    }

    #[tokio::test]
    async fn test_engine_fault_does_not_poison_slot() {
        let pool = WorkerPool::create(image(), PoolConfig::default().with_size(1))
            .await
            .unwrap();
        let worker = pool.primary().unwrap();

        let err = worker.fft(999u64, 0u64).await.unwrap_err();
        assert!(err.is_remote());

        let addr = worker.transfer_to_heap(&[1, 2, 3]).await.unwrap();
        assert_eq!(worker.transfer_from_heap(addr, 3).await.unwrap(), vec![1, 2, 3]);
        pool.destroy().await;
    }

    // =============================================================================
    // TEARDOWN
    // =============================================================================

    #[tokio::test]
    async fn test_shutdown_fails_later_calls() {
        let mut crs = MemoryCrs::random(40, &SeededRandomSource::new(5)).unwrap();
        let ctx = proving_context(2, 16, &mut crs).await;
        let primary = ctx.primary().unwrap();

        ctx.shutdown().await;
        assert_eq!(ctx.pool().state(), PoolState::Destroyed);

        let err = ctx.fft().fft(&[]).await.unwrap_err();
        assert!(matches!(err, PoolError::InvalidState { .. }));
        assert!(timeout(GUARD, primary.bbmalloc(8u64)).await.unwrap().is_err());
        assert!(ctx.primary().is_err());
    }

    #[tokio::test]
    async fn test_metrics_reflect_pooled_work() {
        zk_telemetry::register_metrics().unwrap();

        let mut crs = MemoryCrs::random(40, &SeededRandomSource::new(6)).unwrap();
        let ctx = proving_context(2, 16, &mut crs).await;
        ctx.fft().fft(&pack(&elements(16, 1))).await.unwrap();

        let text = zk_telemetry::encode_metrics().unwrap();
        assert!(text.contains("zk_pool_pooled_op_duration_seconds"));
        assert!(text.contains("zk_transport_requests_sent_total"));
        ctx.shutdown().await;
    }
}
