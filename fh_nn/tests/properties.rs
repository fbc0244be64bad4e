//! Property tests over random head configurations.

use fh_nn::head::{random_features, seeded_head};
use fh_nn::{softmax, Mode};
use fh_backend_cpu::CpuBackend;
use fh_tensor::prelude::*;
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn head_output_is_batch_by_classes(
        dims in prop::collection::vec(1usize..4, 1..4),
        batch in 1usize..5,
        classes in 1usize..6,
        hidden in 1usize..16,
        seed in any::<u64>(),
        train in any::<bool>(),
    ) {
        let dims = FeatureShape::new(dims);
        let head = seeded_head(&dims, classes, hidden, seed).unwrap();
        let mode = if train { Mode::Train } else { Mode::Infer };

        let probs = head.forward(&random_features(&dims, batch, seed), mode).unwrap();

        prop_assert_eq!(probs.shape().dims(), &[batch, classes][..]);
        for row in probs.as_slice().chunks(classes) {
            prop_assert!(row.iter().all(|&p| p >= 0.0));
            prop_assert!((row.iter().sum::<f32>() - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn softmax_rows_sum_to_one(
        logits in prop::collection::vec(-50.0f32..50.0, 1..24),
    ) {
        let n = logits.len();
        let x = Tensor::<CpuBackend>::from_vec(logits, Shape::new(vec![1, n]));
        let p = softmax(&x);

        prop_assert!(p.as_slice().iter().all(|&v| (0.0..=1.0).contains(&v)));
        prop_assert!((p.as_slice().iter().sum::<f32>() - 1.0).abs() < 1e-4);
    }
}
