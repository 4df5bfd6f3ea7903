//! Projection UTM, zone de référence 31N (EPSG:32631) qui couvre le Bénin
//!
//! Séries de Krüger à l'ordre n³ (précision millimétrique dans la zone).

/// Demi-grand axe WGS84 (m)
const WGS84_A: f64 = 6378137.0;
/// Aplatissement WGS84
const WGS84_F: f64 = 1.0 / 298.257223563;

const K0: f64 = 0.9996;
const FALSE_EASTING: f64 = 500000.0;
const FALSE_NORTHING_SOUTH: f64 = 10000000.0;

/// Zone UTM (numéro + hémisphère)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UtmZone {
    pub zone: u32,
    pub south: bool,
}

impl UtmZone {
    /// Zone 31N (EPSG:32631)
    pub const BENIN: UtmZone = UtmZone {
        zone: 31,
        south: false,
    };

    /// Code EPSG WGS84 / UTM de la zone
    pub fn epsg(self) -> u32 {
        let base = if self.south { 32700 } else { 32600 };
        base + self.zone
    }

    fn lon0(self) -> f64 {
        (6.0 * self.zone as f64 - 183.0).to_radians()
    }

    fn northing_origin(self) -> f64 {
        if self.south {
            FALSE_NORTHING_SOUTH
        } else {
            0.0
        }
    }
}

/// Coefficients des séries, fonction du seul troisième aplatissement `n`
struct Series {
    /// Rayon rectifiant multiplié par k0
    scale: f64,
    e: f64,
    alpha: [f64; 3],
    beta: [f64; 3],
    delta: [f64; 3],
}

impl Series {
    fn wgs84() -> Self {
        let n = WGS84_F / (2.0 - WGS84_F);
        let (n2, n3) = (n * n, n * n * n);
        let rectifying = WGS84_A / (1.0 + n) * (1.0 + n2 / 4.0 + n2 * n2 / 64.0);
        Self {
            scale: K0 * rectifying,
            e: 2.0 * n.sqrt() / (1.0 + n),
            alpha: [
                n / 2.0 - 2.0 * n2 / 3.0 + 5.0 * n3 / 16.0,
                13.0 * n2 / 48.0 - 3.0 * n3 / 5.0,
                61.0 * n3 / 240.0,
            ],
            beta: [
                n / 2.0 - 2.0 * n2 / 3.0 + 37.0 * n3 / 96.0,
                n2 / 48.0 + n3 / 15.0,
                17.0 * n3 / 480.0,
            ],
            delta: [
                2.0 * n - 2.0 * n2 / 3.0 - 2.0 * n3,
                7.0 * n2 / 3.0 - 8.0 * n3 / 5.0,
                56.0 * n3 / 15.0,
            ],
        }
    }
}

/// Convertit UTM vers (longitude, latitude) en degrés WGS84
pub fn utm_to_geographic(x: f64, y: f64, zone: UtmZone) -> (f64, f64) {
    let s = Series::wgs84();
    let xi = (y - zone.northing_origin()) / s.scale;
    let eta = (x - FALSE_EASTING) / s.scale;

    let (mut xi_p, mut eta_p) = (xi, eta);
    for (j, b) in s.beta.iter().enumerate() {
        let k = 2.0 * (j + 1) as f64;
        xi_p -= b * (k * xi).sin() * (k * eta).cosh();
        eta_p -= b * (k * xi).cos() * (k * eta).sinh();
    }

    // Latitude conforme puis latitude géodésique
    let chi = (xi_p.sin() / eta_p.cosh()).asin();
    let lat = s
        .delta
        .iter()
        .enumerate()
        .fold(chi, |acc, (j, d)| acc + d * (2.0 * (j + 1) as f64 * chi).sin());
    let lon = zone.lon0() + eta_p.sinh().atan2(xi_p.cos());

    (lon.to_degrees(), lat.to_degrees())
}

/// Convertit (longitude, latitude) en degrés WGS84 vers UTM
pub fn geographic_to_utm(lon: f64, lat: f64, zone: UtmZone) -> (f64, f64) {
    let s = Series::wgs84();
    let phi = lat.to_radians();
    let dlon = lon.to_radians() - zone.lon0();

    let t = (phi.sin().atanh() - s.e * (s.e * phi.sin()).atanh()).sinh();
    let xi_p = t.atan2(dlon.cos());
    let eta_p = (dlon.sin() / (1.0 + t * t).sqrt()).atanh();

    let (mut xi, mut eta) = (xi_p, eta_p);
    for (j, a) in s.alpha.iter().enumerate() {
        let k = 2.0 * (j + 1) as f64;
        xi += a * (k * xi_p).sin() * (k * eta_p).cosh();
        eta += a * (k * xi_p).cos() * (k * eta_p).sinh();
    }

    (
        FALSE_EASTING + s.scale * eta,
        zone.northing_origin() + s.scale * xi,
    )
}
