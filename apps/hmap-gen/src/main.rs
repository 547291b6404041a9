// This file is part of hmap-gen.
//
// hmap-gen is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// hmap-gen is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with hmap-gen.  If not, see <http://www.gnu.org/licenses/>.
use anyhow::Result;
use log::debug;
use prj::Prj;
use std::{path::PathBuf, process};
use structopt::StructOpt;
use terr::{HeightmapSelection, SmoothingAlgorithm};

/// Replace, extract, compress, and inspect the heightmaps of Dark Omen PRJ files
#[derive(Debug, StructOpt)]
#[structopt(
    name = "hmap-gen",
    after_help = "Example: hmap-gen B1_01.PRJ -i heightmap.png\n\
                  Overwrites both heightmaps of B1_01.PRJ with the one in heightmap.png"
)]
struct Opt {
    /// Replace the heightmaps in the TERR block with this image. Both heightmaps
    /// are overwritten unless -1 or -2 is given.
    #[structopt(short = "i", long = "heightmap", parse(from_os_str))]
    heightmap: Option<PathBuf>,

    /// Compress the TERR block. Default for -i.
    #[structopt(short = "c", long = "compress")]
    compress: bool,

    /// Decompress the TERR block.
    #[structopt(short = "d", long = "decompress")]
    decompress: bool,

    /// Swap the first and second heightmaps.
    #[structopt(short = "w", long = "swap")]
    swap: bool,

    /// Write here instead of overwriting the PRJ file; with -e, the image to write.
    #[structopt(short = "o", long = "outfile", parse(from_os_str))]
    outfile: Option<PathBuf>,

    /// Print statistics about the TERR block. Default if nothing else is asked for.
    #[structopt(short = "s", long = "statistic")]
    statistic: bool,

    /// Select the first heightmap.
    #[structopt(short = "1", long = "hmap1")]
    hmap1: bool,

    /// Select the second heightmap.
    #[structopt(short = "2", long = "hmap2")]
    hmap2: bool,

    /// Extract one heightmap (-1 or -2) into a PNG given with -o.
    #[structopt(short = "e", long = "extract")]
    extract: bool,

    /// Use Rob's height scaling when extracting.
    #[structopt(short = "r", long = "rob")]
    rob: bool,

    /// The PRJ file to process
    #[structopt(parse(from_os_str))]
    input: PathBuf,
}

impl Opt {
    fn selection(&self) -> HeightmapSelection {
        let mut selection = HeightmapSelection::empty();
        selection.set(HeightmapSelection::FIRST, self.hmap1);
        selection.set(HeightmapSelection::SECOND, self.hmap2);
        selection
    }
}

fn usage_error(msg: &str) -> ! {
    eprintln!("{msg}");
    process::exit(1);
}

fn main() -> Result<()> {
    env_logger::init();
    let opt = Opt::from_args();
    debug!("{:?}", opt);
    if opt.extract {
        extract(&opt)
    } else {
        edit(opt)
    }
}

fn extract(opt: &Opt) -> Result<()> {
    let target = match &opt.outfile {
        Some(target) => target,
        None => usage_error("No target file (-o) provided for image extraction."),
    };
    let selection = opt.selection();
    if selection.is_all() {
        usage_error("Only one heightmap can be extracted at once.");
    }
    if selection.is_empty() {
        usage_error("No heightmap (-1 or -2) specified.");
    }
    let smoothing = if opt.rob {
        SmoothingAlgorithm::Rob
    } else {
        SmoothingAlgorithm::Default
    };

    let prj = Prj::from_path(&opt.input)?;
    let image = prj.terr().to_image(selection, smoothing)?;
    image.save_with_format(target, image::ImageFormat::Png)?;
    Ok(())
}

fn edit(mut opt: Opt) -> Result<()> {
    if opt.compress && opt.decompress {
        usage_error("-c and -d are incompatible.");
    }
    if opt.heightmap.is_some() && !opt.decompress {
        opt.compress = true;
    }
    let edited = opt.heightmap.is_some() || opt.swap || opt.compress || opt.decompress;
    if !edited {
        opt.statistic = true;
    }
    let mut selection = opt.selection();
    if selection.is_empty() {
        selection = HeightmapSelection::all();
    }

    let mut prj = Prj::from_path(&opt.input)?;
    let mut terr = prj.terr().clone();
    if let Some(path) = &opt.heightmap {
        let image = image::open(path)?;
        terr = terr.from_image(&image, selection)?;
    }
    if opt.swap {
        terr = terr.swap();
    }
    if opt.decompress {
        terr = terr.decompress();
    } else if opt.compress {
        terr = terr.compress();
    }

    if edited {
        prj.set_terr(terr);
        let target = opt.outfile.as_ref().unwrap_or(&opt.input);
        prj.save(target)?;
    }
    if opt.statistic {
        eprintln!("{}", prj.terr().statistics());
    }
    Ok(())
}
