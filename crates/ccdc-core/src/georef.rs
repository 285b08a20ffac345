/// GeoTIFF georeferencing carried verbatim from an input layer to an output.
///
/// Tags are kept in their raw TIFF form so that an output written with the
/// reference of layer 0 is georeferenced exactly like layer 0, whatever CRS
/// the GeoKeys describe.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeoReference {
    /// ModelPixelScale (33550): [ScaleX, ScaleY, ScaleZ].
    pub pixel_scale: Option<Vec<f64>>,
    /// ModelTiepoint (33922): [I, J, K, X, Y, Z] (possibly repeated).
    pub tiepoint: Option<Vec<f64>>,
    /// ModelTransformation (34264): 4x4 row-major affine matrix.
    pub transformation: Option<Vec<f64>>,
    /// GeoKeyDirectory (34735).
    pub geo_keys: Option<Vec<u16>>,
    /// GeoDoubleParams (34736).
    pub geo_doubles: Option<Vec<f64>>,
    /// GeoAsciiParams (34737).
    pub geo_ascii: Option<String>,
    /// GDAL_NODATA (42113).
    pub nodata: Option<String>,
}

impl GeoReference {
    /// True when no georeferencing tag is present.
    pub fn is_empty(&self) -> bool {
        self.pixel_scale.is_none()
            && self.tiepoint.is_none()
            && self.transformation.is_none()
            && self.geo_keys.is_none()
    }

    /// GDAL-style affine geotransform
    /// `[origin_x, pixel_w, rot_x, origin_y, rot_y, pixel_h]`.
    ///
    /// Derived from the transformation matrix when present, otherwise from
    /// the first tiepoint and the pixel scale.
    pub fn geo_transform(&self) -> Option<[f64; 6]> {
        if let Some(m) = self.transformation.as_deref() {
            if m.len() >= 8 {
                return Some([m[3], m[0], m[1], m[7], m[4], m[5]]);
            }
        }
        let scale = self.pixel_scale.as_deref()?;
        let tie = self.tiepoint.as_deref()?;
        if scale.len() < 2 || tie.len() < 6 {
            return None;
        }
        let (i, j, x, y) = (tie[0], tie[1], tie[3], tie[4]);
        Some([x - i * scale[0], scale[0], 0.0, y + j * scale[1], 0.0, -scale[1]])
    }

    /// Whether two layers sit on the same pixel grid.
    ///
    /// Layers without any geotransform compare equal to each other only.
    pub fn matches(&self, other: &GeoReference, tol: f64) -> bool {
        match (self.geo_transform(), other.geo_transform()) {
            (Some(a), Some(b)) => a.iter().zip(b.iter()).all(|(p, q)| (p - q).abs() <= tol),
            (None, None) => true,
            _ => false,
        }
    }

    /// Same georeferencing with a different nodata value.
    pub fn with_nodata(mut self, nodata: Option<f64>) -> Self {
        self.nodata = nodata.map(|v| v.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utm_like() -> GeoReference {
        GeoReference {
            pixel_scale: Some(vec![30.0, 30.0, 0.0]),
            tiepoint: Some(vec![0.0, 0.0, 0.0, -2_115_585.0, 3_314_805.0, 0.0]),
            geo_keys: Some(vec![1, 1, 0, 1, 1024, 0, 1, 1]),
            ..GeoReference::default()
        }
    }

    #[test]
    fn geo_transform_from_scale_and_tiepoint() {
        let gt = utm_like().geo_transform().unwrap();
        assert_eq!(gt, [-2_115_585.0, 30.0, 0.0, 3_314_805.0, 0.0, -30.0]);
    }

    #[test]
    fn geo_transform_offsets_non_origin_tiepoint() {
        let g = GeoReference {
            pixel_scale: Some(vec![10.0, 10.0, 0.0]),
            tiepoint: Some(vec![2.0, 3.0, 0.0, 1000.0, 5000.0, 0.0]),
            ..GeoReference::default()
        };
        let gt = g.geo_transform().unwrap();
        assert_eq!(gt[0], 980.0);
        assert_eq!(gt[3], 5030.0);
    }

    #[test]
    fn geo_transform_prefers_matrix() {
        let mut m = vec![0.0; 16];
        m[0] = 30.0;
        m[3] = 100.0;
        m[5] = -30.0;
        m[7] = 200.0;
        m[15] = 1.0;
        let g = GeoReference { transformation: Some(m), ..utm_like() };
        assert_eq!(g.geo_transform().unwrap(), [100.0, 30.0, 0.0, 200.0, 0.0, -30.0]);
    }

    #[test]
    fn matches_within_tolerance() {
        let a = utm_like();
        let mut b = utm_like();
        b.tiepoint.as_mut().unwrap()[3] += 1e-9;
        assert!(a.matches(&b, 1e-6));

        b.tiepoint.as_mut().unwrap()[3] += 30.0;
        assert!(!a.matches(&b, 1e-6));
        assert!(!a.matches(&GeoReference::default(), 1e-6));
        assert!(GeoReference::default().matches(&GeoReference::default(), 1e-6));
    }
}
