use image::RgbImage;

pub type Pixel = [f32; 3];

pub fn index2d(height: usize, width: usize) -> impl Iterator<Item = (usize, usize, usize)>{
    (0..(width*height)).map(move |idx|{
        let x = idx % width;
        let y = (idx - x) / width;
        (idx, y, x)
    })
}

/// Square neighbourhood around a pixel, replicating the border.
pub trait PixelTail {
    /// `(dy, dx, pixel)` for every offset in `-radius..=radius`, row major.
    fn get_tail(&self, radius: usize, y: usize, x: usize) -> Vec<(i32, i32, Pixel)>;

    fn get_px_tail(&self, radius: usize, y: usize, x: usize) -> Vec<Pixel> {
        self.get_tail(radius, y, x).into_iter().map(|(_, _, pixel)| pixel).collect()
    }
}

impl PixelTail for RgbImage {
    fn get_tail(&self, radius: usize, y: usize, x: usize) -> Vec<(i32, i32, Pixel)>{
        let radius = radius as i32;
        let (width, height) = (self.width() as i32, self.height() as i32);
        let side = (2*radius as usize)+1;
        let mut tail = Vec::with_capacity(side*side);

        for dy in -radius..=radius {
            for dx in -radius..=radius {
                let row = (y as i32 + dy).clamp(0, height-1) as u32;
                let col = (x as i32 + dx).clamp(0, width-1) as u32;
                let [r, g, b] = self.get_pixel(col, row).0;
                tail.push((dy, dx, [r as f32, g as f32, b as f32]));
            }
        }
        return tail
    }
}

pub trait Stats {
    fn mean(self) -> f32;
}

impl Stats for std::slice::Iter<'_, f32>{
    fn mean(self) -> f32{
        let lenght = self.len();
        if lenght == 0{
            return 0.0
        }
        let sum: f32 = self.sum();
        return sum/lenght as f32
    }
}

pub fn weighted_average(weights_and_values: impl Iterator<Item = (f32, Pixel)>) -> Pixel {
    let mut weights_sum = 0.0;
    let mut weighted_channel_sums = [0.0, 0.0, 0.0];

    for (weight, pixel) in weights_and_values {
        weights_sum += weight;
        for i in 0..3 {
            weighted_channel_sums[i] += weight * pixel[i];
        }
    }

    if weights_sum == 0.0 {
        return [0.0, 0.0, 0.0];
    }

    weighted_channel_sums.map(|x| x/weights_sum)
}

/// Rounds a float pixel back to 8 bits, saturating.
pub fn to_u8_pixel(pixel: Pixel) -> [u8; 3] {
    pixel.map(|v| v.round().clamp(0.0, 255.0) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_mean_f32(){
        let data: Vec<f32> = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];

        assert_eq!(data.iter().mean(), 3.5)
    }

    #[test]
    fn test_mean_of_nothing(){
        let data: Vec<f32> = vec![];

        assert_eq!(data.iter().mean(), 0.0)
    }

    #[test]
    fn test_index2d(){
        let indices: Vec<_> = index2d(2, 3).collect();
        assert_eq!(indices, vec![(0, 0, 0), (1, 0, 1), (2, 0, 2), (3, 1, 0), (4, 1, 1), (5, 1, 2)]);
    }

    #[test]
    fn test_tail_replicates_border(){
        // 3x3 image, pixel value encodes its index
        let image = RgbImage::from_fn(3, 3, |x, y| {
            let v = (y * 3 + x) as u8;
            Rgb([v, v, v])
        });

        let center: Vec<f32> = image.get_px_tail(1, 1, 1).iter().map(|p| p[0]).collect();
        assert_eq!(center, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);

        let corner: Vec<f32> = image.get_px_tail(1, 0, 0).iter().map(|p| p[0]).collect();
        assert_eq!(corner, vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 3.0, 3.0, 4.0]);

        let offsets: Vec<(i32, i32)> = image.get_tail(1, 0, 0).iter().map(|(dy, dx, _)| (*dy, *dx)).collect();
        assert_eq!(offsets[0], (-1, -1));
        assert_eq!(offsets[8], (1, 1));
    }

    #[test]
    fn test_weighted_average(){
        let avg = weighted_average(vec![(1.0, [0.0, 2.0, 4.0]), (3.0, [4.0, 2.0, 0.0])].into_iter());
        assert_eq!(avg, [3.0, 2.0, 1.0]);
        assert_eq!(weighted_average(std::iter::empty()), [0.0, 0.0, 0.0]);
    }
}
