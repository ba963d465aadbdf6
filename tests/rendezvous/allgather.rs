use simcomm::{DataType, ReduceOp, Tensor};

use super::helpers::run_group;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_allgather_concat_in_rank_order() {
    let results = run_group(3, |group| async move {
        let rank = group.self_rank().unwrap();
        let send = Tensor::from_vec([1, 2], vec![rank * 10, rank * 10 + 1]).unwrap();
        let mut recv = Tensor::zeros([3, 2], DataType::U32);
        group.allgather(&send, &mut recv).await.unwrap();
        recv
    })
    .await;

    for r in &results {
        assert_eq!(r.shape(), &[3, 2]);
        assert_eq!(r.to_vec::<u32>().unwrap(), vec![0, 1, 10, 11, 20, 21]);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_allgather_and_allreduce_keep_separate_counters() {
    let results = run_group(2, |group| async move {
        let rank = group.self_rank().unwrap();
        let send = Tensor::scalar(rank as f32 + 1.0);

        let mut gathered = Tensor::zeros([2], DataType::F32);
        group.allgather(&send, &mut gathered).await.unwrap();

        let mut reduced = Tensor::zeros(Vec::new(), DataType::F32);
        group.allreduce(&send, &mut reduced, ReduceOp::Sum).await.unwrap();

        group.allgather(&send, &mut gathered).await.unwrap();

        (
            gathered.to_vec::<f32>().unwrap(),
            reduced.to_vec::<f32>().unwrap(),
        )
    })
    .await;

    for (gathered, reduced) in results {
        assert_eq!(gathered, vec![1.0, 2.0]);
        assert_eq!(reduced, vec![3.0]);
    }
}
