//! Property tests for the log10 target transform.

use ndarray::Array2;
use pi_estimator::TargetTransform;
use proptest::collection::vec as prop_vec;
use proptest::prelude::*;

fn arb_positive() -> impl Strategy<Value = f64> {
    1e-6f64..1e6f64
}

proptest! {
    #[test]
    fn forward_then_inverse_is_identity_for_positive_values(
        values in prop_vec(arb_positive(), 2..40),
        flags in prop_vec(any::<bool>(), 2),
    ) {
        let rows = values.len() / 2;
        let original = Array2::from_shape_vec((rows, 2), values[..rows * 2].to_vec()).unwrap();
        let transform = TargetTransform::from_pairs(
            flags.iter().enumerate().map(|(i, &f)| (format!("y{i}"), f)),
        );

        let mut data = original.clone();
        transform.forward_inplace(data.view_mut()).unwrap();
        for (j, &flag) in flags.iter().enumerate() {
            if !flag {
                prop_assert_eq!(data.column(j), original.column(j));
            }
        }

        transform.inverse_inplace(data.view_mut()).unwrap();
        for (a, b) in data.iter().zip(original.iter()) {
            prop_assert!((a - b).abs() <= 1e-9 * b.abs().max(1.0), "{} vs {}", a, b);
        }
    }

    #[test]
    fn flag_count_must_match_columns(cols in 1usize..5, n_flags in 1usize..5) {
        let transform = TargetTransform::from_pairs((0..n_flags).map(|i| (format!("y{i}"), true)));
        let mut data = Array2::<f64>::ones((3, cols));
        prop_assert_eq!(transform.forward_inplace(data.view_mut()).is_ok(), cols == n_flags);
    }
}
