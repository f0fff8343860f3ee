//! SVG output via `plotters`.

pub mod cloud;
pub mod scatter;

use plotters::style::{Palette, Palette99, RGBColor};

use crate::cluster::Label;

pub const FONT: &str = "sans-serif";

const NOISE: RGBColor = RGBColor(170, 170, 170);

/// Noise is grey; clusters cycle through a fixed palette.
pub fn label_color(label: Label) -> RGBColor {
    match label {
        Label::Noise => NOISE,
        Label::Cluster(c) => {
            let (r, g, b) = Palette99::COLORS[c % Palette99::COLORS.len()];
            RGBColor(r, g, b)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colors_are_stable_and_noise_is_grey() {
        assert_eq!(label_color(Label::Noise), NOISE);
        assert_eq!(label_color(Label::Cluster(3)), label_color(Label::Cluster(3)));
        assert_ne!(label_color(Label::Cluster(0)), label_color(Label::Cluster(1)));
    }
}
