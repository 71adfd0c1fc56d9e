pub const GRADIENT: [&str; 101] = [
    "#ffff00", "#fffd00", "#fffc00", "#fff900", "#fff800", "#fff600", "#fff500", "#fff300",
    "#fff200", "#fff000", "#ffee00", "#ffec00", "#ffeb00", "#ffe800", "#ffe700", "#ffe600",
    "#ffe300", "#ffe100", "#ffe000", "#ffdf00", "#ffdd00", "#ffdb00", "#ffda00", "#ffd800",
    "#ffd600", "#ffd300", "#ffd200", "#ffd000", "#ffcf00", "#ffcc00", "#ffcb00", "#ffc900",
    "#ffc700", "#ffc500", "#ffc300", "#ffc300", "#ffc000", "#ffbf00", "#ffbd00", "#ffbb00",
    "#ffb900", "#ffb800", "#ffb500", "#ffb300", "#ffb200", "#ffb000", "#ffad00", "#ffac00",
    "#ffa900", "#ffa800", "#ffa600", "#ffa400", "#ffa200", "#ffa100", "#ff9e00", "#ff9c00",
    "#ff9a00", "#ff9900", "#ff9600", "#ff9400", "#ff9300", "#ff9000", "#ff8f00", "#ff8c00",
    "#ff8900", "#ff8700", "#ff8600", "#ff8300", "#ff8200", "#ff7f00", "#ff7c00", "#ff7b00",
    "#ff7800", "#ff7600", "#ff7300", "#ff7100", "#ff6e00", "#ff6c00", "#ff6900", "#ff6700",
    "#ff6500", "#ff6100", "#ff5e00", "#ff5c00", "#ff5900", "#ff5600", "#ff5300", "#ff5000",
    "#ff4d00", "#ff4900", "#ff4600", "#ff4200", "#ff3d00", "#ff3a00", "#ff3400", "#ff3000",
    "#ff2a00", "#ff2400", "#ff1c00", "#ff1100", "#ff0000",
];

pub fn clamp_percentage(percentage: f64) -> f64 {
    if !percentage.is_finite() || percentage < 0.0 {
        return 0.0;
    }
    percentage.min(100.0)
}

/// Gradient color for a percentage. The index is the truncated percentage.
pub fn percentage_to_color(percentage: f64) -> &'static str {
    let index = clamp_percentage(percentage).trunc() as usize;
    GRADIENT[index.min(GRADIENT.len() - 1)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints() {
        assert_eq!(percentage_to_color(0.0), "#ffff00");
        assert_eq!(percentage_to_color(100.0), "#ff0000");
    }

    #[test]
    fn truncates_instead_of_rounding() {
        assert_eq!(percentage_to_color(1.99), GRADIENT[1]);
        assert_eq!(percentage_to_color(99.9), GRADIENT[99]);
    }

    #[test]
    fn out_of_range_is_clamped() {
        assert_eq!(percentage_to_color(-5.0), "#ffff00");
        assert_eq!(percentage_to_color(f64::NAN), "#ffff00");
        assert_eq!(percentage_to_color(250.0), "#ff0000");
    }

    #[test]
    fn gradient_moves_toward_red() {
        let green = |hex: &str| u8::from_str_radix(&hex[3..5], 16).unwrap();
        assert!(GRADIENT.windows(2).all(|pair| green(pair[0]) >= green(pair[1])));
    }
}
