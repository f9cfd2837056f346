use image::{ImageBuffer, Pixel, Primitive, Rgb, Rgba};
use num_traits::AsPrimitive;

use crate::imageops::{get_max_value, is_floating_point};

/// Composite a buffer with an alpha channel over an opaque background.
pub trait FlattenAlpha {
    type Output;
    type Background;

    fn flatten_onto(&self, background: Self::Background) -> Self::Output;
}

impl<S> FlattenAlpha for ImageBuffer<Rgba<S>, Vec<S>>
where
    Rgba<S>: Pixel<Subpixel = S>,
    Rgb<S>: Pixel<Subpixel = S>,
    S: Primitive + AsPrimitive<f32> + 'static,
    f32: AsPrimitive<S>,
{
    type Output = ImageBuffer<Rgb<S>, Vec<S>>;
    type Background = Rgb<S>;

    fn flatten_onto(&self, background: Rgb<S>) -> Self::Output {
        let max = get_max_value::<S>().as_();
        let integral = !is_floating_point::<S>();
        let Rgb([bg_r, bg_g, bg_b]) = background;
        let mut img = ImageBuffer::new(self.width(), self.height());
        for (x, y, p) in self.enumerate_pixels() {
            let Rgba([r, g, b, a]) = *p;
            let alpha = a.as_() / max;
            let over = |channel: S, bg: S| {
                let blended = channel.as_() * alpha + bg.as_() * (1.0 - alpha);
                let blended = if integral { blended.round() } else { blended };
                blended.as_()
            };
            img.put_pixel(x, y, Rgb([over(r, bg_r), over(g, bg_g), over(b, bg_b)]));
        }
        img
    }
}
