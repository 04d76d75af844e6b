//! Bounding boxes and per-frame detections.

/// Axis-aligned box in MOTChallenge `tlwh` convention (top-left corner, width, height).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Corners (x1, y1, x2, y2).
    pub fn tlbr(&self) -> [f64; 4] {
        [self.x, self.y, self.x + self.width, self.y + self.height]
    }

    /// Width over height; zero for degenerate boxes.
    pub fn aspect_ratio(&self) -> f64 {
        if self.height > 0.0 {
            self.width / self.height
        } else {
            0.0
        }
    }

    /// Intersection over union with another box.
    pub fn iou(&self, other: &BoundingBox) -> f64 {
        let [a_x1, a_y1, a_x2, a_y2] = self.tlbr();
        let [b_x1, b_y1, b_x2, b_y2] = other.tlbr();

        let inter_w = (a_x2.min(b_x2) - a_x1.max(b_x1)).max(0.0);
        let inter_h = (a_y2.min(b_y2) - a_y1.max(b_y1)).max(0.0);
        let inter_area = inter_w * inter_h;

        let union_area = self.area() + other.area() - inter_area;
        if union_area > 0.0 {
            inter_area / union_area
        } else {
            0.0
        }
    }
}

/// A scored detection fed to a tracking model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub score: f64,
}

impl Detection {
    pub fn new(bbox: BoundingBox, score: f64) -> Self {
        Self { bbox, score }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_iou_perfect_overlap() {
        let b = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        assert_relative_eq!(b.iou(&b), 1.0, epsilon = 1e-10);
    }

    #[test]
    fn test_iou_no_overlap() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(20.0, 20.0, 10.0, 10.0);
        assert_relative_eq!(a.iou(&b), 0.0, epsilon = 1e-10);
    }

    #[test]
    fn test_iou_partial_overlap() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(5.0, 5.0, 10.0, 10.0);
        // Intersection: 5x5 = 25, Union: 100 + 100 - 25 = 175
        assert_relative_eq!(a.iou(&b), 25.0 / 175.0, epsilon = 1e-10);
    }

    #[test]
    fn test_degenerate_box() {
        let a = BoundingBox::new(3.0, 3.0, 0.0, 0.0);
        assert_relative_eq!(a.iou(&a), 0.0);
        assert_relative_eq!(a.aspect_ratio(), 0.0);
    }

    #[test]
    fn test_tlbr_corners() {
        let b = BoundingBox::new(1.0, 2.0, 10.0, 20.0);
        assert_eq!(b.tlbr(), [1.0, 2.0, 11.0, 22.0]);
    }
}
