//! Symmetrized incremental position hashing.
//!
//! A position inside a board rectangle is hashed as the sum of per-point
//! weights, added for black stones and subtracted for white stones. A
//! [`HashRegion`] keeps eight such sums at once, one per board flip, so
//! the minimum of the eight is a key that does not depend on the
//! orientation of the position. The flip achieving the minimum tells how
//! the stored position was normalized.

use crate::board::Color;
use crate::constants::*;
use crate::pattern::{Pattern, flip_x, flip_y};
use crate::symmetry::PatternList;

/// Per-point weights, indexed by `x + boardsize * y`.
pub static HASH_CODES: [i64; 361] = [
    1448047776469843, 23745670021858756, 2503503679898819, 20893061577159209,
    10807838381971450, 2362252468869198, 24259008893265414, 12770534669822463,
    6243872632612083, 9878602848666731, 15403460661141300, 23328125617276831,
    24399618481479321, 6553504962910284, 1670313139184804, 12980312942597170,
    20479559860862969, 9622188310955879, 240315181816498, 15806748501866401,
    11025185739521454, 9892014082139049, 24468178939325513, 18336761931886570,
    17607110247268341, 1659968630984898, 15644176636883129, 21288430710467667,
    21718647773405600, 8449573198599383, 12949198458251018, 13260609204816340,
    15942818511406502, 19422389391992560, 2306873372585698, 13245768415868578,
    3527685889767840, 16821792770065498, 14659578113224043, 8882299950073676,
    7855747638699870, 11443553816792995, 10278034782711378, 9888977721917330,
    8622555585025384, 20622776792089008, 6447699412562541, 21593237574254863,
    4100056509197325, 8358405560798101, 24120904895822569, 21004758159739407,
    4380824971205155, 23810250238005035, 11573868012372637, 21740007761325076,
    20569500166060069, 23367084743140030, 832128940274250, 3863567854976796,
    8401188629788306, 20293444021869434, 12476938100997420, 5997141871489394,
    777596196611050, 8407423122275781, 23742268390341663, 6606677504119583,
    17099083579458611, 128040681345920, 7441253945309846, 17672412151152227,
    14657002484427869, 3764334613856311, 7399928989161192, 24730167942169592,
    13814924480574978, 5810810907567287, 7008927747711241, 3714629224790215,
    9946435535599731, 20057491299504334, 15866852457019228, 123155262761331,
    1315783062254243, 24497766846727950, 12902532251391440, 16788431106050494,
    15993209359043506, 6163570598235227, 23479274902645580, 12086295521073246,
    14074331278381816, 1049820141442769, 5160957003350972, 24302799572195320,
    23881606652035662, 23969818184919245, 19374430422494128, 9346353622623467,
    13646698673919768, 20787456987251805, 19834903548127921, 8194151691638546,
    7687885124853709, 4843137186034754, 23141719256229263, 5528755394284040,
    22362536622784133, 7624654257445620, 8792845080211956, 24991012676161170,
    5382030845010972, 1942150054817210, 1024267612932772, 14257279792025309,
    11127353401828247, 4123063511789286, 363215666444395, 15523634951795520,
    21114031740764324, 12549698630972549, 7906682572409157, 9682658163949194,
    14445831019902887, 19796086007848283, 25041651202294181, 434144873391024,
    24468825775827696, 16436890395501393, 16373785289815135, 16626551488832360,
    7748715007439309, 22731617567631698, 14232800365889972, 10951727445457549,
    8041373240290953, 24930514145406896, 9591184974667554, 24880672410562956,
    23221721160805093, 20593543181655919, 23599230930155014, 15520097083998302,
    14424914931817466, 7073972177203460, 16674214483955582, 4557916889838393,
    14520120252661131, 2948253205366287, 18549806070390636, 10409566723123418,
    18398906015238963, 21169009649313417, 18391044531337716, 2911838512392375,
    13771057876708721, 11955633853535396, 18911960208175147, 1483143365895487,
    5864164841327281, 16798674080914657, 21169543712647072, 2554895121282201,
    12465286616181485, 5756888636558955, 2597276631190750, 2560624395830604,
    20296901708171088, 14642976680682096, 12194169777111940, 938262584370639,
    7206443811292574, 501111636607822, 5705951146039127, 19098237626875269,
    5726006303511723, 5717532750720198, 4848344546021481, 7407311808156422,
    2061821731974308, 8556380079387133, 13575103943220600, 10594365938844562,
    19966653780019989, 24412404083453688, 8019373982039936, 7753495706295280,
    838015840877266, 5235642127051968, 10225916255867901, 14975561937408701,
    4914762527221109, 16273933213731410, 25240707945233645, 6477894775523777,
    16128190602024745, 12452291569329611, 51030855211419, 1848783942303739,
    2537297571305471, 24811709277564335, 23354767332363093, 11338712562024830,
    10845782284945582, 20710115514013598, 19611282767915684, 11160258605900113,
    17875966449141620, 8400967803093668, 6871997953834029, 13914235659320051,
    8949576634650339, 2143755776666584, 13309009078638265, 17871461210902733,
    11987276750060947, 19212042799964345, 9684310155516547, 1307858104678668,
    8369225045337652, 11470364009363081, 10726698770860164, 22857364846703600,
    25284735055035435, 19224377054148393, 16403807100295998, 4653376186522389,
    15242640882406966, 15315275662931969, 11642086728644568, 12158439227609947,
    5366950703441186, 21989897136444615, 21241101455718813, 1591417368086590,
    14579493634035095, 23329624772309429, 4022767503269837, 12858990365780377,
    1546772101519453, 23839228242060485, 3152020333001361, 7700997223270546,
    7886359803633970, 18794372628879385, 22159114735365084, 7999390508114986,
    17413096555746886, 9385231705999634, 15875377080359488, 4319895571584052,
    15831501864738265, 23927036136254152, 9023165779396619, 6131245054225200,
    20314359892927215, 1896686091879468, 14130616725563771, 22653904323575475,
    9831497463521490, 13110057076369419, 5902087517632052, 23714067728868348,
    10422641883492326, 10327276345146850, 795518417987648, 25452954487907785,
    3500196309207718, 14513995844064906, 7844549909962914, 9407804562184273,
    15229768031797498, 14111656085687927, 16834184600349678, 7291182384885469,
    17771577974633552, 21586473553657942, 18166326806718423, 10928317030329388,
    13135712137024532, 12947681282864548, 21220312239923983, 9606249244876101,
    4653965165819933, 5039148287631156, 3987726544496362, 11235885894214833,
    3549024987193191, 6369560450327424, 5296536600431238, 10833371878822587,
    5746338282416722, 20335144029844343, 14857534135172842, 13933887642921338,
    3610489245941154, 7780064458218242, 18217608762631328, 4861734558486078,
    19138089389909524, 162404484845663, 6326150309736266, 5691634479075905,
    14377989390160001, 7788436404648140, 20312143630017606, 6781467023516504,
    7265384191721189, 13990392558924592, 4811546322556989, 3891404257596968,
    19222546653408634, 9733466771346453, 20011679489309705, 11556921572925005,
    13429005557512149, 16680841455593148, 394589115298971, 22224576785554448,
    18262625753524808, 20893780129453860, 25064972830160559, 241970110039610,
    7452533933839720, 10726026396546933, 17312051917081899, 17281553837379637,
    24008819488103387, 5193878516496164, 21529615734706496, 22844915602846365,
    17118246686087168, 6560869056902581, 10553021967047717, 3729950813036887,
    14459986099519295, 15808907290234758, 6234512969275540, 18690008075805909,
    492531108753402, 7721002928884704, 4886156035126456, 21716374046066558,
    11035311630511661, 16837692753538891, 20172053977953882, 15488511700491202,
    17477921115358343, 24726937211646877, 22480504880004621, 18521326635500559,
    8076560603417178, 22382516625473209, 21696842111535623, 12559160944089288,
    1661142873895453, 18379772814447567, 10295321430586466, 12378145201769592,
    11815752235866582,
];

/// Weight of `(x, y)` in the hash for flip `f`.
fn weight(f: u8, x: usize, y: usize, boardsize: usize) -> i64 {
    let b = boardsize - 1;
    HASH_CODES[flip_x(f, x, y, b, b) + boardsize * flip_y(f, x, y, b, b)]
}

/// Eight rolling hash codes of a board rectangle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HashRegion {
    pub x0: usize,
    pub y0: usize,
    pub size_x: usize,
    pub size_y: usize,
    pub boardsize: usize,
    codes: [i64; 8],
    num_stones: usize,
    changed: bool,
    saved: Vec<([i64; 8], usize)>,
}

impl HashRegion {
    pub fn new(x0: usize, y0: usize, size_x: usize, size_y: usize, boardsize: usize) -> Self {
        Self {
            x0,
            y0,
            size_x,
            size_y,
            boardsize,
            codes: [0; 8],
            num_stones: 0,
            changed: true,
            saved: Vec::new(),
        }
    }

    /// Region covering the whole board.
    pub fn full_board(boardsize: usize) -> Self {
        Self::new(0, 0, boardsize, boardsize, boardsize)
    }

    pub fn reset(&mut self) {
        self.codes = [0; 8];
        self.num_stones = 0;
        self.changed = true;
        self.saved.clear();
    }

    pub fn contains(&self, x: usize, y: usize) -> bool {
        x >= self.x0 && x < self.x0 + self.size_x && y >= self.y0 && y < self.y0 + self.size_y
    }

    fn apply(&mut self, x: usize, y: usize, sign: i64) {
        for (f, code) in self.codes.iter_mut().enumerate() {
            *code = code.wrapping_add(sign.wrapping_mul(weight(f as u8, x, y, self.boardsize)));
        }
        self.changed = true;
    }

    pub fn add(&mut self, x: usize, y: usize, color: Color) {
        if !self.contains(x, y) {
            return;
        }
        self.apply(x, y, if color == Color::Black { 1 } else { -1 });
        self.num_stones += 1;
    }

    pub fn remove(&mut self, x: usize, y: usize, color: Color) {
        if !self.contains(x, y) {
            return;
        }
        self.apply(x, y, if color == Color::Black { -1 } else { 1 });
        self.num_stones = self.num_stones.saturating_sub(1);
    }

    pub fn num_stones(&self) -> usize {
        self.num_stones
    }

    /// Returns whether the region changed since the last call.
    pub fn take_changed(&mut self) -> bool {
        std::mem::replace(&mut self.changed, false)
    }

    /// Smallest of the eight codes and the first flip achieving it.
    pub fn canonical(&self) -> (i64, u8) {
        let mut best = (self.codes[0], 0u8);
        for (f, &c) in self.codes.iter().enumerate().skip(1) {
            if c < best.0 {
                best = (c, f as u8);
            }
        }
        best
    }

    /// Top-left corner as a board index.
    pub fn position(&self) -> u32 {
        (self.x0 + self.boardsize * self.y0) as u32
    }

    pub fn push(&mut self) {
        self.saved.push((self.codes, self.num_stones));
    }

    pub fn pop(&mut self) {
        if let Some((codes, num_stones)) = self.saved.pop() {
            self.codes = codes;
            self.num_stones = num_stones;
        }
    }
}

/// Symmetrized key of a pattern restricted to a board rectangle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryKey {
    pub key: i64,
    /// Distinct flips (up to the pattern's own symmetries) achieving the key.
    pub flips: Vec<u8>,
    pub num_stones: usize,
}

/// Hashes the board rectangle `[x0, x0 + size_x) x [y0, y0 + size_y)`
/// as covered by `pattern` placed at its top-left anchor.
///
/// Returns `None` if the rectangle contains a point that is not fully
/// determined (`x`, `o` or `*`).
pub fn region_key(
    plist: &PatternList,
    pattern: &Pattern,
    (x0, y0): (usize, usize),
    (size_x, size_y): (usize, usize),
) -> Option<QueryKey> {
    let mut codes = [0i64; 8];
    let mut num_stones = 0;
    for y in y0..y0 + size_y {
        for x in x0..x0 + size_x {
            let (px, py) = (x.checked_sub(pattern.left)?, y.checked_sub(pattern.top)?);
            if px >= pattern.size_x || py >= pattern.size_y {
                return None;
            }
            let sign = match pattern.get(px, py) {
                STONE_BLACK => 1,
                STONE_WHITE => -1,
                EMPTY => continue,
                _ => return None,
            };
            num_stones += 1;
            for (f, code) in codes.iter_mut().enumerate() {
                *code = code.wrapping_add(sign * weight(f as u8, x, y, pattern.boardsize));
            }
        }
    }
    let key = codes.iter().copied().min()?;
    let mut flips = Vec::new();
    for (ii, &c) in codes.iter().enumerate() {
        if c != key {
            continue;
        }
        let Some(ind) = plist.orientation(ii as u8, false) else {
            continue;
        };
        let f = plist.data[ind].flip;
        if !flips.contains(&f) {
            flips.push(f);
        }
    }
    Some(QueryKey {
        key,
        flips,
        num_stones,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::PatternKind;

    #[test]
    fn test_codes_are_positive_and_distinct() {
        assert!(HASH_CODES.iter().all(|&c| c > 0));
        let mut sorted = HASH_CODES.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), 361);
    }

    #[test]
    fn test_canonical_key_is_flip_invariant() {
        let stones = [(2, 3, Color::Black), (15, 4, Color::White), (9, 9, Color::Black)];
        let mut a = HashRegion::full_board(19);
        for &(x, y, c) in &stones {
            a.add(x, y, c);
        }
        for f in 0..8u8 {
            let mut b = HashRegion::full_board(19);
            for &(x, y, c) in &stones {
                b.add(flip_x(f, x, y, 18, 18), flip_y(f, x, y, 18, 18), c);
            }
            assert_eq!(a.canonical().0, b.canonical().0, "flip {f}");
        }
    }

    #[test]
    fn test_add_remove_restores() {
        let mut r = HashRegion::new(0, 0, 7, 7, 19);
        r.add(1, 1, Color::Black);
        let before = r.canonical();
        r.add(2, 2, Color::White);
        r.remove(2, 2, Color::White);
        assert_eq!(r.canonical(), before);
        assert_eq!(r.num_stones(), 1);
        // Outside the region nothing happens.
        r.add(10, 10, Color::Black);
        assert_eq!(r.num_stones(), 1);
    }

    #[test]
    fn test_branch_stack() {
        let mut r = HashRegion::full_board(9);
        r.add(4, 4, Color::Black);
        r.push();
        let saved = r.canonical();
        r.add(3, 3, Color::White);
        r.pop();
        assert_eq!(r.canonical(), saved);
        assert_eq!(r.num_stones(), 1);
    }

    #[test]
    fn test_changed_flag() {
        let mut r = HashRegion::new(0, 0, 7, 7, 19);
        assert!(r.take_changed());
        assert!(!r.take_changed());
        r.add(18, 18, Color::Black);
        assert!(!r.take_changed());
        r.add(0, 0, Color::Black);
        assert!(r.take_changed());
    }

    #[test]
    fn test_region_key_matches_region_hash() {
        let p = Pattern::new(PatternKind::CornerNW, 19, 7, 7, "X...... ..O.... ....... ....... ....... ....... .......")
            .unwrap();
        let plist = PatternList::new(p.clone(), true, None).unwrap();
        let q = region_key(&plist, &p, (0, 0), (7, 7)).unwrap();
        let mut r = HashRegion::new(0, 0, 7, 7, 19);
        r.add(0, 0, Color::Black);
        r.add(2, 1, Color::White);
        assert_eq!(q.key, r.canonical().0);
        assert_eq!(q.num_stones, 2);
        assert!(!q.flips.is_empty());
    }

    #[test]
    fn test_wildcards_are_not_hashable() {
        let p = Pattern::new(PatternKind::CornerNW, 19, 2, 2, "X*..").unwrap();
        let plist = PatternList::new(p.clone(), true, None).unwrap();
        assert!(region_key(&plist, &p, (0, 0), (2, 2)).is_none());
    }
}
