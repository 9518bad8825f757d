//! Constant-velocity Kalman filter over XYAH boxes (center x, center y,
//! aspect ratio, height) plus their velocities.

use ndarray::{Array1, Array2};

/// Squared standard deviations on the diagonal, zeros elsewhere.
fn noise_matrix(std: &[f64]) -> Array2<f64> {
    Array2::from_diag(&Array1::from_iter(std.iter().map(|s| s * s)))
}

#[derive(Debug, Clone)]
pub struct KalmanFilter {
    motion_mat: Array2<f64>,
    update_mat: Array2<f64>,
    std_weight_position: f64,
    std_weight_velocity: f64,
}

impl Default for KalmanFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl KalmanFilter {
    const NDIM: usize = 4;

    pub fn new() -> Self {
        let ndim = Self::NDIM;
        // x' = x + v for every box coordinate
        let motion_mat = Array2::from_shape_fn((2 * ndim, 2 * ndim), |(i, j)| {
            if i == j || j == i + ndim { 1.0 } else { 0.0 }
        });
        // observe positions only
        let update_mat = Array2::from_shape_fn((ndim, 2 * ndim), |(i, j)| if i == j { 1.0 } else { 0.0 });

        Self {
            motion_mat,
            update_mat,
            std_weight_position: 1.0 / 20.0,
            std_weight_velocity: 1.0 / 160.0,
        }
    }

    /// Start a track from an unassociated XYAH measurement with zero velocity.
    pub fn initiate(&self, measurement: [f64; 4]) -> (Array1<f64>, Array2<f64>) {
        let mut mean = Array1::<f64>::zeros(2 * Self::NDIM);
        mean.slice_mut(ndarray::s![..Self::NDIM])
            .assign(&Array1::from_vec(measurement.to_vec()));

        let h = measurement[3];
        let pos = 2.0 * self.std_weight_position * h;
        let vel = 10.0 * self.std_weight_velocity * h;
        let covariance = noise_matrix(&[pos, pos, 1e-2, pos, vel, vel, 1e-5, vel]);

        (mean, covariance)
    }

    pub fn predict(
        &self,
        mean: &Array1<f64>,
        covariance: &Array2<f64>,
    ) -> (Array1<f64>, Array2<f64>) {
        let h = mean[3];
        let pos = self.std_weight_position * h;
        let vel = self.std_weight_velocity * h;
        let motion_cov = noise_matrix(&[pos, pos, 1e-2, pos, vel, vel, 1e-5, vel]);

        let new_mean = self.motion_mat.dot(mean);
        let new_covariance = self.motion_mat.dot(covariance).dot(&self.motion_mat.t()) + motion_cov;

        (new_mean, new_covariance)
    }

    /// Project the state distribution into measurement space.
    pub fn project(
        &self,
        mean: &Array1<f64>,
        covariance: &Array2<f64>,
    ) -> (Array1<f64>, Array2<f64>) {
        let pos = self.std_weight_position * mean[3];
        let innovation_cov = noise_matrix(&[pos, pos, 1e-1, pos]);

        let mean_proj = self.update_mat.dot(mean);
        let covariance_proj =
            self.update_mat.dot(covariance).dot(&self.update_mat.t()) + innovation_cov;

        (mean_proj, covariance_proj)
    }

    pub fn update(
        &self,
        mean: &Array1<f64>,
        covariance: &Array2<f64>,
        measurement: [f64; 4],
    ) -> (Array1<f64>, Array2<f64>) {
        let (projected_mean, projected_cov) = self.project(mean, covariance);

        let measurement_arr = Array1::from_vec(measurement.to_vec());
        let innovation = measurement_arr - projected_mean;

        // K = P * H^T * S^-1
        // Since H is [I 0], P * H^T is the first 4 columns of P (8x4).
        // S is projected_cov (4x4).
        let Some(s_inv) = invert_4x4(&projected_cov) else {
            log::warn!("singular innovation covariance, skipping measurement update");
            return (mean.clone(), covariance.clone());
        };

        let pht = covariance.dot(&self.update_mat.t()); // 8x4
        let kalman_gain = pht.dot(&s_inv); // 8x4

        let new_mean = mean + kalman_gain.dot(&innovation);
        let new_covariance = covariance - kalman_gain.dot(&projected_cov).dot(&kalman_gain.t());

        (new_mean, new_covariance)
    }
}

/// Invert a 4x4 matrix with nalgebra, `None` when it is singular.
fn invert_4x4(m: &Array2<f64>) -> Option<Array2<f64>> {
    let nm = nalgebra::Matrix4::from_fn(|i, j| m[[i, j]]);
    let inv = nm.try_inverse()?;
    Some(Array2::from_shape_fn((4, 4), |(i, j)| inv[(i, j)]))
}
