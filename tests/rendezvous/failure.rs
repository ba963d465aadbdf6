use simcomm::{DataType, GroupKey, ReduceOp, SimcommConfig, SimcommError, Tensor};
use std::time::Duration;

use super::helpers::{alloc, local_group, run_on, test_config};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_shape_mismatch_fails_and_closes_group() {
    let (_driver, groups) = local_group(2, test_config());

    let results = run_on(groups, |group| async move {
        let rank = group.self_rank().unwrap() as usize;

        // A well-formed round first.
        let send = Tensor::full([20], 1.0f32);
        let mut recv = Tensor::zeros([20], DataType::F32);
        group.allreduce(&send, &mut recv, ReduceOp::Sum).await.unwrap();
        assert_eq!(recv.to_vec::<f32>().unwrap(), vec![2.0; 20]);

        // Ranks disagree on the shape: (10,) vs (20,).
        let shape = vec![10 * (rank + 1)];
        let send = Tensor::full(shape.clone(), 1.0f32);
        let mut recv = Tensor::zeros(shape.clone(), DataType::F32);
        let mismatch = group.allreduce(&send, &mut recv, ReduceOp::Sum).await;
        let untouched = recv.to_vec::<f32>().unwrap().iter().all(|v| *v == 0.0);

        // No partial recovery: every later operation is refused.
        let mut recv = Tensor::zeros(shape, DataType::F32);
        let after = group.allreduce(&send, &mut recv, ReduceOp::Sum).await;
        let after_p2p = group.send(Tensor::scalar(1.0f32), 1 - rank as u32).await;

        (mismatch, untouched, after, after_p2p, group.is_closed())
    })
    .await;

    for (mismatch, untouched, after, after_p2p, closed) in results {
        assert!(matches!(mismatch, Err(SimcommError::ShapeMismatch { .. })));
        assert!(untouched, "no reduced value may be written on failure");
        assert!(matches!(after, Err(SimcommError::Closed)));
        assert!(matches!(after_p2p, Err(SimcommError::Closed)));
        assert!(closed);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_dtype_mismatch_fails_every_participant() {
    let (_driver, groups) = local_group(2, test_config());

    let results = run_on(groups, |group| async move {
        let (send, mut recv) = if group.self_rank() == Some(0) {
            (Tensor::full([4], 1i32), Tensor::zeros([4], DataType::I32))
        } else {
            (Tensor::full([4], 1.0f64), Tensor::zeros([4], DataType::F64))
        };
        group.allreduce(&send, &mut recv, ReduceOp::Max).await
    })
    .await;

    for r in results {
        assert!(matches!(r, Err(SimcommError::DTypeMismatch { .. })));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_missing_peer_times_out_then_rejects() {
    let config = SimcommConfig::with_timeout(Duration::from_millis(100));
    let (_driver, groups) = local_group(3, config);
    let lonely = groups[0].clone();

    let send = Tensor::scalar(1u64);
    let mut recv = Tensor::zeros(Vec::new(), DataType::U64);
    let err = lonely
        .allreduce(&send, &mut recv, ReduceOp::Sum)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SimcommError::Timeout {
            operation: "allreduce",
            timeout_ms: 100,
            ..
        }
    ));
    assert!(lonely.is_closed());

    let err = lonely.recv(&[], DataType::U64, 1, alloc).await.unwrap_err();
    assert!(matches!(err, SimcommError::Closed));

    // Peers that never took part are unaffected.
    assert!(!groups[1].is_closed());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_late_peer_fails_after_contributor_timed_out() {
    let config = SimcommConfig::with_timeout(Duration::from_millis(50));
    let (driver, groups) = local_group(2, config);

    let send = Tensor::scalar(100.0f32);
    let mut recv = Tensor::zeros(Vec::new(), DataType::F32);
    let err = groups[0]
        .allreduce(&send, &mut recv, ReduceOp::Sum)
        .await
        .unwrap_err();
    assert!(matches!(err, SimcommError::Timeout { .. }));
    assert!(groups[0].is_closed());

    // Rank 1 shows up late; rank 0's contribution must not complete the op.
    let send = Tensor::scalar(1.0f32);
    let mut recv = Tensor::zeros(Vec::new(), DataType::F32);
    let err = groups[1]
        .allreduce(&send, &mut recv, ReduceOp::Sum)
        .await
        .unwrap_err();
    assert!(matches!(err, SimcommError::Abandoned { op_id: 0, .. }));
    assert_eq!(recv.to_vec::<f32>().unwrap(), vec![0.0]);
    assert!(groups[1].is_closed());

    let comm = driver
        .registry()
        .get(&GroupKey::allreduce(&[0, 1]))
        .unwrap();
    assert_eq!(comm.pending_ops(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_two_receivers_on_one_key_fail_fast() {
    let (_driver, groups) = local_group(2, test_config());
    // Rank 1 has a second handle that also receives on the (0 -> 1) key.
    let impostor = std::sync::Arc::new(groups[1].with_rank(1).unwrap());
    let receivers = vec![groups[1].clone(), impostor];

    let results = run_on(receivers, |group| async move {
        group.recv(&[], DataType::I8, 0, alloc).await
    })
    .await;

    for r in results {
        assert!(matches!(r, Err(SimcommError::MissingValue { op_id: 0, .. })));
    }
}
