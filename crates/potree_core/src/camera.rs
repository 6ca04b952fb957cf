//! Camera and viewport inputs read once per frame.
//!
//! The host renderer owns the real camera; the scheduler only needs its world
//! matrix, its projection parameters and the drawing-buffer size. Projection
//! matrices follow the OpenGL convention (clip z in [-1, 1]).

use glam::{DMat4, DVec3, DVec4};

use crate::error::{PotreeError, PotreeResult};

/// Projection parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Projection {
  Perspective {
    /// Vertical field of view in degrees.
    fov_y_degrees: f64,
    aspect: f64,
    near: f64,
    far: f64,
  },
  Orthographic {
    left: f64,
    right: f64,
    top: f64,
    bottom: f64,
    near: f64,
    far: f64,
  },
}

/// Camera pose plus projection.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
  /// Camera-to-world transform.
  pub world: DMat4,
  pub projection: Projection,
}

impl Camera {
  /// Perspective camera at the origin looking down -Z.
  pub fn perspective(fov_y_degrees: f64, aspect: f64, near: f64, far: f64) -> Self {
    Self {
      world: DMat4::IDENTITY,
      projection: Projection::Perspective {
        fov_y_degrees,
        aspect,
        near,
        far,
      },
    }
  }

  /// Orthographic camera at the origin looking down -Z.
  pub fn orthographic(left: f64, right: f64, top: f64, bottom: f64, near: f64, far: f64) -> Self {
    Self {
      world: DMat4::IDENTITY,
      projection: Projection::Orthographic {
        left,
        right,
        top,
        bottom,
        near,
        far,
      },
    }
  }

  /// Place the camera at `eye` looking at `target`.
  pub fn looking_at(mut self, eye: DVec3, target: DVec3, up: DVec3) -> Self {
    self.world = DMat4::look_at_rh(eye, target, up).inverse();
    self
  }

  /// World-space camera position.
  #[inline]
  pub fn position(&self) -> DVec3 {
    self.world.w_axis.truncate()
  }

  /// World-to-camera transform.
  pub fn view_matrix(&self) -> PotreeResult<DMat4> {
    let determinant = self.world.determinant();
    if !determinant.is_finite() || determinant.abs() < f64::EPSILON {
      return Err(PotreeError::InvalidCamera(
        "camera world matrix is not invertible".into(),
      ));
    }
    Ok(self.world.inverse())
  }

  pub fn projection_matrix(&self) -> DMat4 {
    match self.projection {
      Projection::Perspective {
        fov_y_degrees,
        aspect,
        near,
        far,
      } => DMat4::perspective_rh_gl(fov_y_degrees.to_radians(), aspect, near, far),
      Projection::Orthographic {
        left,
        right,
        top,
        bottom,
        near,
        far,
      } => DMat4::orthographic_rh_gl(left, right, bottom, top, near, far),
    }
  }

  /// Reject projections that cannot produce a usable frustum.
  pub fn validate(&self) -> PotreeResult<()> {
    if !self.world.is_finite() {
      return Err(PotreeError::InvalidCamera("camera world matrix is not finite".into()));
    }

    match self.projection {
      Projection::Perspective {
        fov_y_degrees,
        aspect,
        near,
        far,
      } => {
        if !(fov_y_degrees > 0.0 && fov_y_degrees < 180.0) {
          return Err(PotreeError::InvalidCamera(format!(
            "perspective fov must be in (0, 180) degrees, got {fov_y_degrees}"
          )));
        }
        if !(aspect.is_finite() && aspect > 0.0) {
          return Err(PotreeError::InvalidCamera(format!(
            "perspective aspect must be positive, got {aspect}"
          )));
        }
        if !(near > 0.0 && far > near && far.is_finite()) {
          return Err(PotreeError::InvalidCamera(format!(
            "perspective planes must satisfy 0 < near < far, got near={near} far={far}"
          )));
        }
      }
      Projection::Orthographic {
        left,
        right,
        top,
        bottom,
        near,
        far,
      } => {
        let values = [left, right, top, bottom, near, far];
        if values.iter().any(|v| !v.is_finite()) {
          return Err(PotreeError::InvalidCamera(
            "orthographic bounds must be finite".into(),
          ));
        }
        if top == bottom || left == right || near == far {
          return Err(PotreeError::InvalidCamera(
            "orthographic bounds are degenerate".into(),
          ));
        }
      }
    }

    Ok(())
  }
}

/// Renderer drawing-buffer size.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
  pub width: u32,
  pub height: u32,
  /// Device pixels per CSS pixel.
  pub pixel_ratio: f64,
}

impl Viewport {
  pub fn new(width: u32, height: u32) -> Self {
    Self {
      width,
      height,
      pixel_ratio: 1.0,
    }
  }

  pub fn with_pixel_ratio(mut self, pixel_ratio: f64) -> Self {
    self.pixel_ratio = pixel_ratio;
    self
  }

  /// Half the drawing-buffer height in device pixels.
  #[inline]
  pub fn half_height(&self) -> f64 {
    0.5 * self.height as f64 * self.pixel_ratio
  }

  pub fn validate(&self) -> PotreeResult<()> {
    if self.width == 0 || self.height == 0 || !(self.pixel_ratio.is_finite() && self.pixel_ratio > 0.0) {
      return Err(PotreeError::InvalidViewport {
        width: self.width,
        height: self.height,
        pixel_ratio: self.pixel_ratio,
      });
    }
    Ok(())
  }
}

/// World-space ray.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ray {
  pub origin: DVec3,
  /// Unit direction.
  pub direction: DVec3,
}

impl Ray {
  /// Ray from `origin` along `direction` (normalized here).
  pub fn new(origin: DVec3, direction: DVec3) -> Self {
    Self {
      origin,
      direction: direction.normalize_or_zero(),
    }
  }

  /// Ray through a viewport pixel (origin top-left, y down).
  pub fn from_screen(camera: &Camera, viewport: &Viewport, x: f64, y: f64) -> PotreeResult<Self> {
    camera.validate()?;
    viewport.validate()?;

    let ndc_x = (x / viewport.width as f64) * 2.0 - 1.0;
    let ndc_y = 1.0 - (y / viewport.height as f64) * 2.0;

    let inverse = (camera.projection_matrix() * camera.view_matrix()?).inverse();
    let unproject = |z: f64| {
      let p = inverse * DVec4::new(ndc_x, ndc_y, z, 1.0);
      p.truncate() / p.w
    };

    let near = unproject(-1.0);
    let far = unproject(1.0);
    Ok(Self::new(near, far - near))
  }

  #[inline]
  pub fn at(&self, t: f64) -> DVec3 {
    self.origin + self.direction * t
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_position_from_looking_at() {
    let camera = Camera::perspective(60.0, 1.0, 0.1, 100.0).looking_at(
      DVec3::new(1.0, 2.0, 3.0),
      DVec3::ZERO,
      DVec3::Y,
    );
    assert!((camera.position() - DVec3::new(1.0, 2.0, 3.0)).length() < 1e-9);
  }

  #[test]
  fn test_validate_rejects_bad_fov() {
    let camera = Camera::perspective(0.0, 1.0, 0.1, 100.0);
    assert!(matches!(camera.validate(), Err(PotreeError::InvalidCamera(_))));

    let camera = Camera::perspective(f64::NAN, 1.0, 0.1, 100.0);
    assert!(camera.validate().is_err());
  }

  #[test]
  fn test_validate_rejects_degenerate_ortho() {
    let camera = Camera::orthographic(-1.0, 1.0, 1.0, 1.0, 0.1, 10.0);
    assert!(camera.validate().is_err());

    let camera = Camera::orthographic(-1.0, 1.0, 1.0, -1.0, 0.1, 10.0);
    assert!(camera.validate().is_ok());
  }

  #[test]
  fn test_viewport_half_height_uses_pixel_ratio() {
    let viewport = Viewport::new(800, 600).with_pixel_ratio(2.0);
    assert_eq!(viewport.half_height(), 600.0);
    assert!(Viewport::new(0, 600).validate().is_err());
  }

  #[test]
  fn test_center_ray_points_forward() {
    let camera = Camera::perspective(60.0, 1.0, 0.1, 100.0).looking_at(
      DVec3::new(0.0, 0.0, 10.0),
      DVec3::ZERO,
      DVec3::Y,
    );
    let viewport = Viewport::new(100, 100);
    let ray = Ray::from_screen(&camera, &viewport, 50.0, 50.0).unwrap();

    assert!((ray.direction - DVec3::NEG_Z).length() < 1e-6);
    assert!((ray.origin.z - 9.9).abs() < 1e-6);
  }
}
